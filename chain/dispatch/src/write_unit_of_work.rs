//! A write unit of work groups one or more mutations so that either
//! all become durable or none do. Not nestable across a yield — a plan
//! that yields mid-WUOW is a bug, caught here rather than silently
//! producing a partially-applied write.

use db_store::RecoveryUnit;

pub struct WriteUnitOfWork {
    recovery_unit: Option<Box<dyn RecoveryUnit>>,
}

impl WriteUnitOfWork {
    pub fn new(recovery_unit: Box<dyn RecoveryUnit>) -> Self {
        WriteUnitOfWork { recovery_unit: Some(recovery_unit) }
    }

    pub fn commit(mut self) {
        if let Some(ru) = self.recovery_unit.take() {
            ru.commit();
        }
    }
}

impl Drop for WriteUnitOfWork {
    fn drop(&mut self) {
        if let Some(ru) = self.recovery_unit.take() {
            ru.rollback();
        }
    }
}
