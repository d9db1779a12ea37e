use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Reservation, ReservationStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub customer_name: String,
    pub phone_number: String,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub num_participants: i32,
    pub user_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl CreateReservationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.customer_name.trim().is_empty() {
            return Err(AppError::BadRequest("Customer name is required".into()));
        }
        if self.phone_number.trim().is_empty() {
            return Err(AppError::BadRequest("Phone number is required".into()));
        }
        if self.num_participants < 1 {
            return Err(AppError::BadRequest(
                "Participant count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Name + phone pair used as the guest capability token: customers have no
/// account credential, so cancellation requires reproducing both exactly.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelReservationRequest {
    pub customer_name: String,
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReservationLookupQuery {
    pub customer_name: String,
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReservationStatusRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationList {
    pub items: Vec<Reservation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateReservationRequest {
        CreateReservationRequest {
            customer_name: "Kim Minji".into(),
            phone_number: "010-1234-5678".into(),
            reservation_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            reservation_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            num_participants: 4,
            user_id: None,
            product_id: None,
            notes: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn blank_name_or_phone_is_rejected() {
        let mut req = request();
        req.customer_name = "  ".into();
        assert!(req.validate().is_err());

        let mut req = request();
        req.phone_number = "".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn participants_below_one_are_rejected() {
        let mut req = request();
        req.num_participants = 0;
        assert!(req.validate().is_err());
    }
}
