//! Loan Payment Calculator
//!
//! Standard annuity amortization used by the advisor's `calculate_loan_payment`
//! tool. The result renders as the plain-text block the agent reads back to the
//! user.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Rejected calculator inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoanError {
    #[error("Principal must be a positive amount, got {0}")]
    InvalidPrincipal(f64),
    #[error("Annual interest rate must be zero or positive, got {0}")]
    InvalidRate(f64),
    #[error("Loan term must be between 1 and {max} years, got {0}", max = MAX_TERM_YEARS)]
    InvalidTerm(u32),
    #[error("Loan terms produce a payment too large to represent")]
    OutOfRange,
}

/// Longest term the calculator accepts.
pub const MAX_TERM_YEARS: u32 = 100;

/// The outcome of an amortization calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanQuote {
    pub principal: f64,
    /// Annual rate in percent, e.g. `6.5` for 6.5%.
    pub annual_rate: f64,
    pub years: u32,
    pub monthly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

/// Computes the fixed monthly payment for an amortized loan.
///
/// A zero rate degrades to an even split of the principal across all months.
pub fn calculate_loan_payment(
    principal: f64,
    annual_rate: f64,
    years: u32,
) -> Result<LoanQuote, LoanError> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(LoanError::InvalidPrincipal(principal));
    }
    if !annual_rate.is_finite() || annual_rate < 0.0 {
        return Err(LoanError::InvalidRate(annual_rate));
    }
    if years == 0 || years > MAX_TERM_YEARS {
        return Err(LoanError::InvalidTerm(years));
    }

    let monthly_rate = annual_rate / 100.0 / 12.0;
    let num_payments = f64::from(years) * 12.0;

    // r / (1 - (1+r)^-n), via ln_1p/exp_m1 so tiny rates keep their precision.
    let monthly_payment = if monthly_rate == 0.0 {
        principal / num_payments
    } else {
        let discount_m1 = (-num_payments * monthly_rate.ln_1p()).exp_m1();
        principal * (monthly_rate / -discount_m1)
    };

    let total_payment = monthly_payment * num_payments;
    if !monthly_payment.is_finite() || !total_payment.is_finite() {
        return Err(LoanError::OutOfRange);
    }
    let total_interest = total_payment - principal;

    Ok(LoanQuote {
        principal,
        annual_rate,
        years,
        monthly_payment,
        total_payment,
        total_interest,
    })
}

impl fmt::Display for LoanQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Loan Payment Calculation:")?;
        writeln!(f, "• Principal: ${}", format_currency(self.principal))?;
        writeln!(f, "• Interest Rate: {}% annually", self.annual_rate)?;
        writeln!(f, "• Term: {} years", self.years)?;
        writeln!(
            f,
            "• Monthly Payment: ${}",
            format_currency(self.monthly_payment)
        )?;
        writeln!(f, "• Total Payment: ${}", format_currency(self.total_payment))?;
        write!(
            f,
            "• Total Interest: ${}",
            format_currency(self.total_interest)
        )
    }
}

/// Formats an amount with two decimals and comma thousands separators.
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}
