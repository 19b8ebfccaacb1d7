use log::info;
use merchant::{ParamSet, PaymentNotificationHandler};

/// Records payment outcomes in the log. Replace with order bookkeeping.
pub struct LoggingNotificationHandler;

impl PaymentNotificationHandler for LoggingNotificationHandler {
    fn on_success(&self, order_id: &str, params: &ParamSet) {
        info!(
            "Order {} paid: amount={} payment_id={}",
            order_id,
            params.get_string("sp_amount").unwrap_or_default(),
            params.get_string("sp_payment_id").unwrap_or_default()
        );
    }

    fn on_fail(&self, order_id: &str, params: &ParamSet) {
        info!(
            "Order {} not paid: payment_id={}",
            order_id,
            params.get_string("sp_payment_id").unwrap_or_default()
        );
    }
}
