//! FinanceBot Advisor
//!
//! The advisor persona and the tools it can call. Tools are served over the
//! Model Context Protocol (MCP) so the agent's reply cycle can list them for the
//! LLM and dispatch the LLM's tool calls without knowing their implementations.

use crate::loan::calculate_loan_payment;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

/// System instructions for every LLM call in a session.
pub const ADVISOR_INSTRUCTIONS: &str = "You are FinanceBot, an expert financial advisor AI assistant.

Your specialty is helping people with:
- Loan and mortgage calculations
- Investment and retirement planning
- Budget analysis and financial advice
- Explaining complex financial concepts simply

When users ask for loan calculations, use the calculate_loan_payment tool and answer in this format:
\"I'll calculate that for you. For a loan of $X at Y% for Z years...\"

Your replies are spoken aloud, so keep them short and conversational and avoid markdown.

Always be professional and emphasize that advice is for informational purposes.";

/// Extra instructions for the opening reply of a session.
pub const GREETING_INSTRUCTIONS: &str = "Greet the user as FinanceBot and say:
'Hello! I'm FinanceBot, your personal financial advisor AI. I can help you with loan calculations, investment planning, and budgeting advice. What financial question can I help you with today?'";

/// Arguments for the `calculate_loan_payment` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct LoanPaymentArgs {
    /// Amount borrowed, in dollars.
    #[schemars(description = "The loan principal in dollars, e.g. 200000")]
    pub principal: f64,
    /// Annual interest rate in percent.
    #[schemars(description = "The annual interest rate in percent, e.g. 6.5 for 6.5%")]
    pub annual_rate: f64,
    /// Loan term in whole years.
    #[schemars(description = "The loan term in whole years, 1 to 100, e.g. 30")]
    pub years: u32,
}

/// MCP tool server for the advisor.
pub struct FinanceAdvisor {
    tool_router: ToolRouter<Self>,
}

impl Default for FinanceAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for FinanceAdvisor {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Financial calculation tools for FinanceBot.".to_string()),
            ..Default::default()
        }
    }
}

#[tool_router]
impl FinanceAdvisor {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Computes the amortized monthly payment and totals for a fixed-rate loan.
    #[tool(
        description = "Calculate the monthly payment, total payment and total interest for a fixed-rate amortized loan or mortgage."
    )]
    pub async fn calculate_loan_payment(
        &self,
        args: Parameters<LoanPaymentArgs>,
    ) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'calculate_loan_payment'");
        let LoanPaymentArgs {
            principal,
            annual_rate,
            years,
        } = args.0;

        calculate_loan_payment(principal, annual_rate, years)
            .map(|quote| quote.to_string())
            .map_err(|e| {
                warn!(error = %e, "Loan calculation rejected");
                e.to_string()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loan_tool_formats_quote() {
        let advisor = FinanceAdvisor::new();
        let reply = advisor
            .calculate_loan_payment(Parameters(LoanPaymentArgs {
                principal: 200_000.0,
                annual_rate: 6.5,
                years: 30,
            }))
            .await
            .unwrap();

        assert!(reply.contains("Monthly Payment: $1,264.14"));
    }

    #[tokio::test]
    async fn test_loan_tool_reports_domain_error() {
        let advisor = FinanceAdvisor::new();
        let err = advisor
            .calculate_loan_payment(Parameters(LoanPaymentArgs {
                principal: 50_000.0,
                annual_rate: 4.0,
                years: 0,
            }))
            .await
            .unwrap_err();

        assert_eq!(err, "Loan term must be between 1 and 100 years, got 0");
    }

    #[test]
    fn test_tool_is_registered() {
        let advisor = FinanceAdvisor::new();
        let tools = advisor.tool_router.list_all();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "calculate_loan_payment");
    }

    #[test]
    fn test_instructions_cover_persona() {
        assert!(ADVISOR_INSTRUCTIONS.starts_with("You are FinanceBot"));
        assert!(ADVISOR_INSTRUCTIONS.contains("informational purposes"));
        assert!(GREETING_INSTRUCTIONS.contains("What financial question can I help you with today?"));
    }
}
