//! Command line parsing
//!
//! `dashboard-client [--config PATH] [--metrics] <METHOD> <PATH> [JSON_BODY]`

use anyhow::{Context, Result, bail};
use reqwest::Method;
use transport::OutgoingRequest;

pub const USAGE: &str =
    "usage: dashboard-client [--config PATH] [--metrics] <METHOD> <PATH> [JSON_BODY]";

#[derive(Debug)]
pub struct Args {
    pub config: Option<String>,
    pub metrics: bool,
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl Args {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut metrics = false;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    config = Some(path);
                }
                "--metrics" => metrics = true,
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(method), Some(path)) = (positional.next(), positional.next()) else {
            bail!("{USAGE}");
        };
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method {method}"))?;
        let body = positional
            .next()
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .context("request body must be valid JSON")?;
        if positional.next().is_some() {
            bail!("too many arguments\n{USAGE}");
        }

        Ok(Self {
            config,
            metrics,
            method,
            path,
            body,
        })
    }

    pub fn request(&self) -> OutgoingRequest {
        let request = OutgoingRequest::new(self.method.clone(), self.path.clone());
        match &self.body {
            Some(body) => request.with_body(body.clone()),
            None => request,
        }
    }
}
