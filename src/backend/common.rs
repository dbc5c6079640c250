//! Record operations shared by the built-in backends.

use super::{BackendError, BackendResult};
use crate::pack::PackBuffer;
use crate::record::{DataType, FieldValue, JobAcctInfo};

pub fn init_struct(record: &mut JobAcctInfo) -> BackendResult<()> {
    record.reset();
    Ok(())
}

pub fn set_info(record: &mut JobAcctInfo, field: DataType, value: FieldValue) -> BackendResult<()> {
    if record.set(field, value) {
        Ok(())
    } else {
        Err(BackendError::invalid_field(field))
    }
}

pub fn get_info(record: &JobAcctInfo, field: DataType) -> BackendResult<FieldValue> {
    Ok(record.get(field))
}

pub fn pack(record: &JobAcctInfo, buffer: &mut PackBuffer) -> BackendResult<()> {
    buffer.pack(record)?;
    Ok(())
}

pub fn unpack(buffer: &mut PackBuffer) -> BackendResult<JobAcctInfo> {
    Ok(buffer.unpack::<JobAcctInfo>()?)
}
