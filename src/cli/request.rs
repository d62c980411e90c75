use anyhow::{anyhow, Context, Result};
use clap::Args;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

use crate::wallet::{PaidResponse, Wallet};

#[derive(Args)]
pub struct GetArgs {
    /// URL to request
    url: String,

    /// Headers (format: "Key: Value")
    #[arg(short = 'H', long)]
    header: Vec<String>,
}

#[derive(Args)]
pub struct PostArgs {
    /// URL to request
    url: String,

    /// JSON request body
    body: String,

    /// Headers (format: "Key: Value")
    #[arg(short = 'H', long)]
    header: Vec<String>,
}

pub async fn get(args: GetArgs, wallet: &Wallet) -> Result<()> {
    let headers = parse_headers(&args.header)?;
    let response = wallet.get(&args.url, headers).await?;
    print_response(&response)
}

pub async fn post(args: PostArgs, wallet: &Wallet) -> Result<()> {
    let body: Value = serde_json::from_str(&args.body).context("Request body is not valid JSON")?;
    let headers = parse_headers(&args.header)?;
    let response = wallet.post(&args.url, &body, headers).await?;
    print_response(&response)
}

fn print_response(response: &PaidResponse) -> Result<()> {
    if let Some(payment) = &response.payment {
        tracing::info!(
            transaction = payment.transaction.as_deref().unwrap_or("-"),
            network = payment.network.as_deref().unwrap_or("-"),
            "Payment settled"
        );
    }
    let output = json!({
        "status": response.status.as_u16(),
        "paid": response.paid,
        "data": response.data,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid header {header:?}, expected \"Key: Value\""))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in {header:?}"))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in {header:?}"))?;
        headers.append(name, value);
    }
    Ok(headers)
}
