use bytes::{BufMut, Bytes, BytesMut};
use pfvf_codec::blkmsg_crc;
use tracing::{debug, error};

use crate::block::{BlockClass, BlockRequest, BlockResponse, HEADER_LEN};
use crate::error::BlockError;

/// One request/response exchange with a block provider.
///
/// Implemented by the VF protocol on top of its request correlator. The
/// error type carries both transport failures and [`BlockError`]s.
pub trait ByteSource {
    type Error: From<BlockError>;

    fn exchange(&mut self, request: BlockRequest) -> Result<BlockResponse, Self::Error>;
}

/// Fetch block `block_type` into at most `buffer_size` bytes.
///
/// Returns `version ‖ length ‖ payload`, truncated to the buffer. The
/// returned bytes are covered by a CRC8 checked against the provider's.
pub fn fetch_block<S: ByteSource>(
    source: &mut S,
    block_type: u8,
    buffer_size: usize,
) -> Result<Bytes, S::Error> {
    let class = BlockClass::of(block_type).ok_or(BlockError::InvalidType { block_type })?;
    if buffer_size < HEADER_LEN {
        return Err(BlockError::BufferTooSmall { size: buffer_size }.into());
    }

    let version = fetch_byte(source, block_type, 0)?;
    if version == 0 {
        return Err(fault(BlockError::ZeroVersion { block_type }));
    }

    let length = fetch_byte(source, block_type, 1)?;
    if length == 0 {
        return Err(fault(BlockError::ZeroLength { block_type }));
    }
    if usize::from(length) > class.max_payload() {
        return Err(fault(BlockError::LengthOutOfRange {
            block_type,
            length,
            max: class.max_payload(),
        }));
    }

    let count = buffer_size.min(HEADER_LEN + usize::from(length));
    let mut buf = BytesMut::with_capacity(count);
    buf.put_u8(version);
    buf.put_u8(length);
    // count is bounded by the class maximum, which fits a u8 index.
    for index in HEADER_LEN..count {
        buf.put_u8(fetch_byte(source, block_type, index as u8)?);
    }

    let remote = match source.exchange(BlockRequest::crc_of(block_type, count)?)? {
        BlockResponse::Crc(crc) => crc,
        BlockResponse::Error(code) => {
            return Err(fault(BlockError::Remote { block_type, code }));
        }
        BlockResponse::Data(_) => {
            return Err(fault(BlockError::UnexpectedResponse { block_type }));
        }
    };
    let local = blkmsg_crc(&buf);
    if local != remote {
        return Err(fault(BlockError::CrcMismatch {
            block_type,
            local,
            remote,
        }));
    }

    debug!(block_type, version, length, count, "block fetched");
    Ok(buf.freeze())
}

fn fetch_byte<S: ByteSource>(source: &mut S, block_type: u8, index: u8) -> Result<u8, S::Error> {
    match source.exchange(BlockRequest::byte(block_type, index))? {
        BlockResponse::Data(byte) => Ok(byte),
        BlockResponse::Error(code) => Err(fault(BlockError::Remote { block_type, code })),
        BlockResponse::Crc(_) => Err(fault(BlockError::UnexpectedResponse { block_type })),
    }
}

fn fault<E: From<BlockError>>(err: BlockError) -> E {
    error!(error = %err, "block transfer fault");
    err.into()
}
