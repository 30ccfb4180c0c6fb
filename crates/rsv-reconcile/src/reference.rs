//! Reference-data resolution: payment methods, sales channels, plans.
//!
//! Payment methods and channels are get-or-create; plans are lookup-only.

use tracing::{debug, Span};

use crate::error::ReferenceError;
use crate::store::StoreTx;

/// Stored in place of a blank payment method.
pub const UNSPECIFIED_PAYMENT_METHOD: &str = "unspecified";

#[derive(Clone)]
pub struct ReferenceResolver {
    span: Span,
}

impl ReferenceResolver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub async fn resolve_payment_method<T: StoreTx>(
        &self,
        tx: &mut T,
        name: &str,
    ) -> Result<i64, ReferenceError> {
        let name = match name.trim() {
            "" => UNSPECIFIED_PAYMENT_METHOD,
            n => n,
        };
        let id = tx
            .get_or_create_payment_method(name)
            .await
            .map_err(ReferenceError::Storage)?;
        debug!(parent: &self.span, payment_method = name, id, "reference/payment_method");
        Ok(id)
    }

    pub async fn resolve_channel<T: StoreTx>(
        &self,
        tx: &mut T,
        name: &str,
    ) -> Result<i64, ReferenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ReferenceError::MissingChannel);
        }
        let id = tx
            .get_or_create_channel(name)
            .await
            .map_err(ReferenceError::Storage)?;
        debug!(parent: &self.span, channel = name, id, "reference/channel");
        Ok(id)
    }

    /// `None` when either key part is blank or no plan matches.
    pub async fn resolve_plan<T: StoreTx>(
        &self,
        tx: &mut T,
        code: &str,
        name: &str,
    ) -> Result<Option<i64>, ReferenceError> {
        let (code, name) = (code.trim(), name.trim());
        if code.is_empty() || name.is_empty() {
            return Ok(None);
        }
        let id = tx
            .find_plan(code, name)
            .await
            .map_err(ReferenceError::Storage)?;
        debug!(parent: &self.span, plan_code = code, found = id.is_some(), "reference/plan");
        Ok(id)
    }
}
