//! Chapter numbering.
//!
//! Chapter numbers inside a book always form the run `1..=n`. Planning an
//! insertion is pure: given the current numbers it decides the new chapter's
//! number and which existing chapters move up. Applying the plan is the storage
//! layer's job and happens inside one transaction (see `Database::insert_chapter`).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("requested chapter number {requested} is outside 1..={next}")]
    InvalidRequestedNumber { requested: u32, next: u32 },
    #[error("chapter numbers {numbers:?} are not a dense run starting at 1")]
    NotDense { numbers: Vec<u32> },
}

/// Outcome of planning one chapter insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPlan {
    /// Number the new chapter will carry
    pub assigned_number: u32,
    /// Existing chapters numbered `>= shift_from` move up by one first
    pub shift_from: Option<u32>,
}

/// Decide where a new chapter goes.
///
/// `existing` are the book's current chapter numbers, in any order. `None`
/// appends after the highest number (1 for an empty book). `Some(n)` places the
/// chapter at `n`, shifting `n..` up; `n` must lie in `1..=max + 1`.
pub fn plan_insertion(existing: &[u32], requested: Option<u32>) -> Result<InsertionPlan, OrderingError> {
    check_dense(existing)?;

    let max = existing.iter().copied().max().unwrap_or(0);
    let next = max + 1;

    match requested {
        None => Ok(InsertionPlan {
            assigned_number: next,
            shift_from: None,
        }),
        Some(requested) if requested == 0 || requested > next => {
            Err(OrderingError::InvalidRequestedNumber { requested, next })
        }
        Some(requested) => Ok(InsertionPlan {
            assigned_number: requested,
            shift_from: (requested <= max).then_some(requested),
        }),
    }
}

/// Numbers the book should have once `plan` is applied to `existing`,
/// with the new chapter's number included, in ascending order.
pub fn apply_plan(existing: &[u32], plan: &InsertionPlan) -> Vec<u32> {
    let mut numbers: Vec<u32> = existing
        .iter()
        .map(|&n| match plan.shift_from {
            Some(from) if n >= from => n + 1,
            _ => n,
        })
        .collect();
    numbers.push(plan.assigned_number);
    numbers.sort_unstable();
    numbers
}

/// Verify `numbers` is exactly `1..=len` once sorted.
pub fn check_dense(numbers: &[u32]) -> Result<(), OrderingError> {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();

    let dense = sorted
        .iter()
        .enumerate()
        .all(|(i, &n)| usize::try_from(n).map_or(false, |n| n == i + 1));

    if dense {
        Ok(())
    } else {
        Err(OrderingError::NotDense { numbers: sorted })
    }
}
