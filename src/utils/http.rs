use cyder_tools::log::error;
use reqwest::Proxy;

use crate::error::BaseError;

pub fn build_reqwest_client(proxy_url: Option<&str>) -> Result<reqwest::Client, BaseError> {
    let mut client_builder = reqwest::Client::builder();
    if let Some(proxy_url) = proxy_url {
        let proxy = Proxy::https(proxy_url).map_err(|e| {
            error!("Invalid proxy URL '{}': {}", proxy_url, e);
            BaseError::ParamInvalid(Some("Invalid proxy configuration".to_string()))
        })?;
        client_builder = client_builder.proxy(proxy);
    }
    client_builder.build().map_err(|e| {
        error!("Failed to build reqwest client: {}", e);
        BaseError::InternalServerError(Some("Failed to build HTTP client".to_string()))
    })
}

/// Masks a credential for logs, keeping only the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
