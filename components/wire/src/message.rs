//! Tagged request/reply schema encoded onto the frames from [`crate::framing`].
//!
//! The original protocol is a protobuf message with a repeated field of
//! tagged operations (`client_msg` / `server_msg`). No `.proto` definition
//! was available to port, so this is a compact hand-rolled binary encoding
//! that preserves the same shape: a request carries one or more tagged
//! operations, and a reply carries one tagged result per operation. The tag
//! values below are fixed and must never be reordered, they are the wire
//! contract between independently built shard-server, master-server, and
//! client binaries.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error decoding message: {0}")]
    Io(#[from] io::Error),
    #[error("unknown operation tag {0}")]
    UnknownTag(u8),
    #[error("truncated message")]
    Truncated,
}

/// Fixed wire order. Appending a new variant must add it at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    Init = 0,
    Get = 1,
    Put = 2,
    TxnStart = 3,
    TxnPut = 4,
    TxnGet = 5,
    TxnGetAndExecute = 6,
    TxnCommit = 7,
    TxnAbort = 8,
}

impl OperationType {
    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        Ok(match tag {
            0 => OperationType::Init,
            1 => OperationType::Get,
            2 => OperationType::Put,
            3 => OperationType::TxnStart,
            4 => OperationType::TxnPut,
            5 => OperationType::TxnGet,
            6 => OperationType::TxnGetAndExecute,
            7 => OperationType::TxnCommit,
            8 => OperationType::TxnAbort,
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

const FLAG_KEY: u8 = 1 << 0;
const FLAG_VALUE: u8 = 1 << 1;
const FLAG_TXN_ID: u8 = 1 << 2;
const FLAG_PORT: u8 = 1 << 3;
const FLAG_SUCCESS: u8 = 1 << 4;
const FLAG_OP_ID: u8 = 1 << 5;

/// A single tagged operation, used both as a request operation and, with the
/// `success` field set, as the corresponding reply operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub op: Option<OperationType>,
    pub key: Option<u32>,
    pub value: Option<Vec<u8>>,
    pub txn_id: Option<u64>,
    /// Reverse-connection port, used only by INIT operations.
    pub port: Option<u16>,
    /// Present on reply operations; absent on requests.
    pub success: Option<bool>,
    /// Reply discriminant distinguishing a GET reply (1) from a PUT reply
    /// (0); carried through verbatim from the reference wire schema.
    pub op_id: Option<u32>,
}

impl Operation {
    pub fn new(op: OperationType) -> Self {
        Operation {
            op: Some(op),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: u32) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_txn_id(mut self, txn_id: u64) -> Self {
        self.txn_id = Some(txn_id);
        self
    }

    pub fn with_op_id(mut self, op_id: u32) -> Self {
        self.op_id = Some(op_id);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    fn encode(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let tag = self.op.expect("operation must have a type to be encoded") as u8;
        out.write_u8(tag)?;
        let mut flags = 0u8;
        if self.key.is_some() {
            flags |= FLAG_KEY;
        }
        if self.value.is_some() {
            flags |= FLAG_VALUE;
        }
        if self.txn_id.is_some() {
            flags |= FLAG_TXN_ID;
        }
        if self.port.is_some() {
            flags |= FLAG_PORT;
        }
        if self.success.is_some() {
            flags |= FLAG_SUCCESS;
        }
        if self.op_id.is_some() {
            flags |= FLAG_OP_ID;
        }
        out.write_u8(flags)?;
        if let Some(key) = self.key {
            out.write_u32::<BigEndian>(key)?;
        }
        if let Some(value) = &self.value {
            out.write_u32::<BigEndian>(value.len() as u32)?;
            out.extend_from_slice(value);
        }
        if let Some(txn_id) = self.txn_id {
            out.write_u64::<BigEndian>(txn_id)?;
        }
        if let Some(port) = self.port {
            out.write_u16::<BigEndian>(port)?;
        }
        if let Some(success) = self.success {
            out.write_u8(success as u8)?;
        }
        if let Some(op_id) = self.op_id {
            out.write_u32::<BigEndian>(op_id)?;
        }
        Ok(())
    }

    fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let tag = read_u8(cursor)?;
        let op = OperationType::from_tag(tag)?;
        let flags = read_u8(cursor)?;
        let key = if flags & FLAG_KEY != 0 {
            Some(read_u32(cursor)?)
        } else {
            None
        };
        let value = if flags & FLAG_VALUE != 0 {
            let len = read_u32(cursor)? as usize;
            let mut buf = vec![0u8; len];
            cursor.read_exact(&mut buf).map_err(|_| CodecError::Truncated)?;
            Some(buf)
        } else {
            None
        };
        let txn_id = if flags & FLAG_TXN_ID != 0 {
            Some(read_u64(cursor)?)
        } else {
            None
        };
        let port = if flags & FLAG_PORT != 0 {
            Some(read_u16(cursor)?)
        } else {
            None
        };
        let success = if flags & FLAG_SUCCESS != 0 {
            Some(read_u8(cursor)? != 0)
        } else {
            None
        };
        let op_id = if flags & FLAG_OP_ID != 0 {
            Some(read_u32(cursor)?)
        } else {
            None
        };
        Ok(Operation {
            op: Some(op),
            key,
            value,
            txn_id,
            port,
            success,
            op_id,
        })
    }
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    cursor.read_u8().map_err(|_| CodecError::Truncated)
}
fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    cursor.read_u16::<BigEndian>().map_err(|_| CodecError::Truncated)
}
fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    cursor.read_u32::<BigEndian>().map_err(|_| CodecError::Truncated)
}
fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, CodecError> {
    cursor.read_u64::<BigEndian>().map_err(|_| CodecError::Truncated)
}

macro_rules! op_list_codec {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            pub ops: Vec<Operation>,
        }

        impl $name {
            pub fn single(op: Operation) -> Self {
                $name { ops: vec![op] }
            }

            pub fn encode(&self) -> Vec<u8> {
                let mut out = Vec::new();
                out.write_u32::<BigEndian>(self.ops.len() as u32).unwrap();
                for op in &self.ops {
                    op.encode(&mut out).expect("encoding into a Vec cannot fail");
                }
                out
            }

            pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
                let mut cursor = Cursor::new(bytes);
                let count = read_u32(&mut cursor)?;
                let mut ops = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ops.push(Operation::decode(&mut cursor)?);
                }
                Ok($name { ops })
            }
        }
    };
}

op_list_codec!(Request);
op_list_codec!(Reply);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_put_request() {
        let req = Request::single(
            Operation::new(OperationType::Put)
                .with_key(42)
                .with_value(b"value".to_vec()),
        );
        let bytes = req.encode();
        let decoded = Request::decode(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn round_trips_a_reply_with_success() {
        let rep = Reply::single(Operation::new(OperationType::Get).with_success(true).with_value(b"v".to_vec()));
        let bytes = rep.encode();
        let decoded = Reply::decode(&bytes).unwrap();
        assert_eq!(rep, decoded);
    }

    #[test]
    fn rejects_unknown_tag() {
        let bytes = vec![0, 0, 0, 1, 200, 0];
        let err = Request::decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownTag(200)));
    }

    #[test]
    fn tag_order_is_fixed() {
        assert_eq!(OperationType::Init as u8, 0);
        assert_eq!(OperationType::Get as u8, 1);
        assert_eq!(OperationType::Put as u8, 2);
        assert_eq!(OperationType::TxnStart as u8, 3);
        assert_eq!(OperationType::TxnPut as u8, 4);
        assert_eq!(OperationType::TxnGet as u8, 5);
        assert_eq!(OperationType::TxnGetAndExecute as u8, 6);
        assert_eq!(OperationType::TxnCommit as u8, 7);
        assert_eq!(OperationType::TxnAbort as u8, 8);
    }
}
