use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Order, OrderItem, OrderStatus},
};

/// One requested line of an order. `price` is the price the client last saw;
/// the order engine treats it as a display hint and re-reads the catalog
/// price inside the transaction.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLine>,
}

impl PlaceOrderRequest {
    /// Fail-fast validation: runs before any database mutation so an invalid
    /// line can never leave a partial order behind.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest("Order has no items".into()));
        }
        for line in &self.items {
            if line.quantity <= 0 {
                return Err(AppError::BadRequest(format!(
                    "Invalid quantity {} for product {}",
                    line.quantity, line.product_id
                )));
            }
            if line.price < 0 {
                return Err(AppError::BadRequest(format!(
                    "Invalid price {} for product {}",
                    line.price, line.product_id
                )));
            }
        }
        Ok(())
    }
}

/// Minimal success payload for order placement: id and the committed total.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPlaced {
    pub order_id: Uuid,
    pub total_amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> OrderLine {
        OrderLine {
            product_id: Uuid::new_v4(),
            price,
            quantity,
        }
    }

    #[test]
    fn empty_order_is_rejected() {
        let req = PlaceOrderRequest { items: vec![] };
        assert!(matches!(req.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        for quantity in [0, -1, -100] {
            let req = PlaceOrderRequest {
                items: vec![line(500, quantity)],
            };
            assert!(matches!(req.validate(), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn negative_price_is_rejected_even_with_valid_lines_around_it() {
        let req = PlaceOrderRequest {
            items: vec![line(500, 1), line(-1, 2), line(300, 1)],
        };
        assert!(matches!(req.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn valid_lines_pass() {
        let req = PlaceOrderRequest {
            items: vec![line(0, 1), line(1500, 3)],
        };
        assert!(req.validate().is_ok());
    }
}
