//! Value objects for the payment domain.

use serde::{Deserialize, Serialize};

use super::PaymentError;

/// A monetary amount in the smallest currency unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn new(amount: i64) -> Self {
        Self(amount)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn amount(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

/// How the user chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    TossPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::TossPay => "TOSS_PAY",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CARD" => Ok(PaymentMethod::Card),
            "TOSS_PAY" => Ok(PaymentMethod::TossPay),
            other => Err(PaymentError::InvalidArgument(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// Reason code carried on the wire by cancellation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    UserCancel,
    AdminCancel,
    StockUnavailable,
    Timeout,
    SystemError,
}

impl CancellationReason {
    /// Maps free text onto a reason code. Anything unrecognised is a system error.
    pub fn from_text(reason: &str) -> Self {
        match reason.trim().to_ascii_uppercase().as_str() {
            "USER_CANCEL" => CancellationReason::UserCancel,
            "ADMIN_CANCEL" => CancellationReason::AdminCancel,
            "STOCK_UNAVAILABLE" => CancellationReason::StockUnavailable,
            "TIMEOUT" => CancellationReason::Timeout,
            _ => CancellationReason::SystemError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::UserCancel => "USER_CANCEL",
            CancellationReason::AdminCancel => "ADMIN_CANCEL",
            CancellationReason::StockUnavailable => "STOCK_UNAVAILABLE",
            CancellationReason::Timeout => "TIMEOUT",
            CancellationReason::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amounts and method fixed when the payment is sent to the gateway.
///
/// They only ever exist together, so a payment holds them as one optional
/// value instead of five independent ones. Built only through
/// [`ChargeDetails::new`], which also guards deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedCharge")]
pub struct ChargeDetails {
    total_amount: Money,
    payment_amount: Money,
    discount_amount: Money,
    delivery_fee: Money,
    method: PaymentMethod,
}

impl ChargeDetails {
    /// Validates that no amount is negative and that the charged amount
    /// does not exceed the order total.
    pub fn new(
        total_amount: Money,
        payment_amount: Money,
        discount_amount: Money,
        delivery_fee: Money,
        method: PaymentMethod,
    ) -> Result<Self, PaymentError> {
        for (name, value) in [
            ("total amount", total_amount),
            ("payment amount", payment_amount),
            ("discount amount", discount_amount),
            ("delivery fee", delivery_fee),
        ] {
            if value.is_negative() {
                return Err(PaymentError::InvalidArgument(format!(
                    "{name} must not be negative: {value}"
                )));
            }
        }
        if payment_amount > total_amount {
            return Err(PaymentError::InvalidArgument(format!(
                "payment amount {payment_amount} exceeds total amount {total_amount}"
            )));
        }

        Ok(Self {
            total_amount,
            payment_amount,
            discount_amount,
            delivery_fee,
            method,
        })
    }

    /// Order total before discount and delivery.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Amount actually charged.
    pub fn payment_amount(&self) -> Money {
        self.payment_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }
}

#[derive(Deserialize)]
struct UncheckedCharge {
    total_amount: Money,
    payment_amount: Money,
    discount_amount: Money,
    delivery_fee: Money,
    method: PaymentMethod,
}

impl TryFrom<UncheckedCharge> for ChargeDetails {
    type Error = PaymentError;

    fn try_from(c: UncheckedCharge) -> Result<Self, Self::Error> {
        ChargeDetails::new(
            c.total_amount,
            c.payment_amount,
            c.discount_amount,
            c.delivery_fee,
            c.method,
        )
    }
}
