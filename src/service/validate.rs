use crate::model::{Ms, NewBooking, Span};

use super::ServiceError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Structural window checks, in order; the first failure wins and nothing
/// is accumulated. Runs before any user or item lookup.
pub(crate) fn validate_window(req: &NewBooking, now: Ms) -> Result<Span, ServiceError> {
    let Some(start) = req.start else {
        return Err(ServiceError::Validation("start is missing".into()));
    };
    let Some(end) = req.end else {
        return Err(ServiceError::Validation("end is missing".into()));
    };
    if start <= now {
        return Err(ServiceError::Validation("start must be in the future".into()));
    }
    if end <= now {
        return Err(ServiceError::Validation("end must be in the future".into()));
    }
    if start > end {
        return Err(ServiceError::Validation("start is after end".into()));
    }
    if start == end {
        return Err(ServiceError::Validation("start equals end".into()));
    }
    Ok(Span::new(start, end))
}
