//! Helpers shared by broker adapters for turning a full [`Order`] into
//! the [`ReplicationEvent`] shape the Stream Consumer boundary produces.

use copytrade_model::{EventSource, Order, OrderFields, ReplicationEvent};

pub fn order_to_replication_event(order: &Order) -> ReplicationEvent {
    ReplicationEvent {
        order_id: order.order_id.clone(),
        status: order.status,
        source: EventSource::Stream,
        create_time: order.created_at,
        update_time: order.updated_at,
        fields: OrderFields {
            security_id: Some(order.security_id),
            side: Some(order.side),
            product: Some(order.product),
            order_type: Some(order.order_type),
            validity: Some(order.validity),
            quantity: Some(order.quantity),
            disclosed_qty: Some(order.disclosed_qty),
            price: Some(order.price),
            trigger_price: Some(order.trigger_price),
            filled_qty: Some(order.filled_qty),
            avg_price: Some(order.avg_price),
            bo_profit_value: order.bo_profit_value,
            bo_stop_loss_value: order.bo_stop_loss_value,
            co_stop_loss_value: order.co_stop_loss_value,
            parent_order_id: order.parent_order_id.clone(),
            leg_type: order.leg_type,
            correlation_id: order.correlation_id.clone(),
            is_amo: Some(order.is_amo),
            raw: None,
        },
    }
}
