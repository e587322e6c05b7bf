//! Append-oriented snapshot persistence.
//!
//! Each queue's live content lives in `<data_dir>/<NAME>.mq` as a
//! concatenation of fixed-header records (see `encode_record`). The file is
//! fully rewritten after every mutating queue operation — there is no
//! write-ahead log and no fsync guarantee, matching the broker's
//! best-effort durability model.

use crate::error::QueueError;
use crate::message::{Message, MessageStatus};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const SIZE_FIELD_LEN: usize = 9;
const TIMESTAMP_FIELD_LEN: usize = 19;
const STATUS_FIELD_LEN: usize = 1;
const ID_FIELD_LEN: usize = 28;
const HEADER_LEN: usize = SIZE_FIELD_LEN + TIMESTAMP_FIELD_LEN + STATUS_FIELD_LEN + ID_FIELD_LEN;

pub fn queue_file_path(data_dir: &Path, queue_name: &str) -> PathBuf {
    data_dir.join(format!("{queue_name}.mq"))
}

/// Encode one message as a persistence record: header + raw body.
fn encode_record(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + msg.data.len());
    buf.extend_from_slice(format!("{:0>9}", msg.data.len()).as_bytes());
    buf.extend_from_slice(format!("{:>19}", msg.timestamp).as_bytes());
    buf.extend_from_slice(msg.status.as_u8().to_string().as_bytes());
    // ids are always exactly 28 bytes (28-char base64), but pad defensively
    // so a short id never corrupts the stream for subsequent records.
    let id_bytes = msg.id.as_bytes();
    let mut id_field = [b' '; ID_FIELD_LEN];
    let n = id_bytes.len().min(ID_FIELD_LEN);
    id_field[..n].copy_from_slice(&id_bytes[..n]);
    buf.extend_from_slice(&id_field);
    buf.extend_from_slice(&msg.data);
    buf
}

/// Rewrite the queue file from scratch with the live (non-terminal) content
/// of `messages`, in the given order. Terminal messages (`Ack`, `Rejected`)
/// are dropped — they never reach disk.
pub fn write_snapshot<'a>(
    data_dir: &Path,
    queue_name: &str,
    messages: impl Iterator<Item = &'a Message>,
) -> Result<(), QueueError> {
    let path = queue_file_path(data_dir, queue_name);
    let tmp_path = path.with_extension("mq.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|source| QueueError::PersistenceIo {
        queue: queue_name.to_owned(),
        source,
    })?;
    for msg in messages {
        if matches!(msg.status, MessageStatus::Ack | MessageStatus::Rejected) {
            continue;
        }
        file.write_all(&encode_record(msg))
            .map_err(|source| QueueError::PersistenceIo {
                queue: queue_name.to_owned(),
                source,
            })?;
    }
    file.flush().map_err(|source| QueueError::PersistenceIo {
        queue: queue_name.to_owned(),
        source,
    })?;
    drop(file);
    std::fs::rename(&tmp_path, &path).map_err(|source| QueueError::PersistenceIo {
        queue: queue_name.to_owned(),
        source,
    })?;
    Ok(())
}

/// Replay a queue file into a list of messages, in on-disk order. Missing
/// files replay as empty. Every replayed message comes back as `Ready`,
/// regardless of the status byte recorded on disk.
pub fn replay(data_dir: &Path, queue_name: &str) -> Result<Vec<Message>, QueueError> {
    let path = queue_file_path(data_dir, queue_name);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(QueueError::PersistenceIo {
                queue: queue_name.to_owned(),
                source,
            })
        }
    };
    decode_records(queue_name, &bytes)
}

fn decode_records(queue_name: &str, bytes: &[u8]) -> Result<Vec<Message>, QueueError> {
    let mut messages = Vec::new();
    let mut cursor = std::io::Cursor::new(bytes);
    loop {
        let mut header = [0u8; HEADER_LEN];
        match cursor.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(source) => {
                return Err(QueueError::PersistenceIo {
                    queue: queue_name.to_owned(),
                    source,
                })
            }
        }

        let size_str = std::str::from_utf8(&header[0..SIZE_FIELD_LEN]).map_err(|_| {
            QueueError::PersistenceCorrupt {
                queue: queue_name.to_owned(),
                reason: "data size field is not valid utf-8".to_owned(),
            }
        })?;
        let data_size: usize = size_str.trim().parse().map_err(|_| QueueError::PersistenceCorrupt {
            queue: queue_name.to_owned(),
            reason: format!("data size field {size_str:?} is not a valid integer"),
        })?;

        let ts_offset = SIZE_FIELD_LEN;
        let ts_str = std::str::from_utf8(&header[ts_offset..ts_offset + TIMESTAMP_FIELD_LEN])
            .map_err(|_| QueueError::PersistenceCorrupt {
                queue: queue_name.to_owned(),
                reason: "timestamp field is not valid utf-8".to_owned(),
            })?;
        let timestamp: i64 = ts_str.trim().parse().map_err(|_| QueueError::PersistenceCorrupt {
            queue: queue_name.to_owned(),
            reason: format!("timestamp field {ts_str:?} is not a valid integer"),
        })?;

        let status_offset = ts_offset + TIMESTAMP_FIELD_LEN;
        let _status_byte = header[status_offset];

        let id_offset = status_offset + STATUS_FIELD_LEN;
        let id = String::from_utf8(header[id_offset..id_offset + ID_FIELD_LEN].to_vec())
            .map_err(|_| QueueError::PersistenceCorrupt {
                queue: queue_name.to_owned(),
                reason: "id field is not valid utf-8".to_owned(),
            })?;

        let mut data = vec![0u8; data_size];
        match cursor.read_exact(&mut data) {
            Ok(()) => {}
            Err(_) => {
                // Truncated trailing record (e.g. a crash mid-write); stop
                // replay here rather than failing the whole queue.
                break;
            }
        }

        messages.push(Message::from_record(id, queue_name.to_owned(), timestamp, data));
    }
    Ok(messages)
}
