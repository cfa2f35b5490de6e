use quiz_core::model::{CompletionSummary, ModuleId, Reward};
use sqlx::Row;

use crate::repository::{CompletionRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn map_completion_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletionRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let module_id = ModuleId::new(row.try_get::<String, _>("module_id").map_err(ser)?);
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let total_stages = u32_from_i64(
        "total_stages",
        row.try_get::<i64, _>("total_stages").map_err(ser)?,
    )?;
    let correct_count = u32_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let passed = bool_from_i64("passed", row.try_get::<i64, _>("passed").map_err(ser)?)?;
    let coins = u32_from_i64("coins", row.try_get::<i64, _>("coins").map_err(ser)?)?;
    let xp = u32_from_i64("xp", row.try_get::<i64, _>("xp").map_err(ser)?)?;

    let summary = CompletionSummary::from_persisted(
        module_id,
        started_at,
        completed_at,
        total_stages,
        correct_count,
        passed,
        coins,
        xp,
    )
    .map_err(ser)?;
    Ok(CompletionRow::new(id, summary))
}

pub(crate) fn map_override_row(row: &sqlx::sqlite::SqliteRow) -> Result<Reward, StorageError> {
    let coins = u32_from_i64("coins", row.try_get::<i64, _>("coins").map_err(ser)?)?;
    let xp = u32_from_i64("xp", row.try_get::<i64, _>("xp").map_err(ser)?)?;
    Ok(Reward::new(coins, xp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bools_are_strict() {
        assert!(!bool_from_i64("passed", 0).unwrap());
        assert!(bool_from_i64("passed", 1).unwrap());
        assert!(bool_from_i64("passed", 2).is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(u32_from_i64("coins", -1).is_err());
        assert_eq!(u32_from_i64("coins", 20).unwrap(), 20);
    }
}
