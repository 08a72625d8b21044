use lti13::{AgsClient, DebugLog, TokenClient};
use std::env;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let token_url = match env::var("LTI_TOKEN_URL") {
        Ok(value) => value,
        Err(_) => {
            eprintln!("LTI_TOKEN_URL is not set. Skipping.");
            eprintln!("Example: LTI_TOKEN_URL=https://lms.example/oauth2/token");
            return Ok(());
        }
    };
    let key_path = match env::var("LTI_PRIVATE_KEY_PEM") {
        Ok(value) => value,
        Err(_) => {
            eprintln!("LTI_PRIVATE_KEY_PEM is not set. Skipping.");
            eprintln!("Example: LTI_PRIVATE_KEY_PEM=/path/tool-private.pem");
            return Ok(());
        }
    };
    let issuer = env::var("LTI_ISSUER").unwrap_or_else(|_| "https://tool.example".to_string());
    let client_id = env::var("LTI_CLIENT_ID").unwrap_or_else(|_| "client123".to_string());
    let lineitem_url = env::var("LTI_LINEITEM_URL")?;
    let user_id = env::var("LTI_USER_ID")?;
    let grade: f64 = env::var("LTI_GRADE")?.parse()?;

    let private_key_pem = fs::read_to_string(key_path)?;

    let mut debug = DebugLog::new();
    let token_client = TokenClient::builder(&token_url)?.build()?;
    let grant = token_client.get_grade_token(
        &issuer,
        &client_id,
        &private_key_pem,
        Some(&mut debug),
    )?;
    let access_token = match grant.access_token {
        Some(token) => token,
        None => {
            eprintln!(
                "token exchange refused: {}",
                grant.error.as_deref().unwrap_or("no access_token in response")
            );
            return Ok(());
        }
    };

    let ags = AgsClient::builder(access_token).build()?;
    ags.send_score(&user_id, grade, "posted from demo", &lineitem_url, Some(&mut debug))?;
    println!("score posted");

    for entry in debug.entries() {
        println!("debug: {entry}");
    }
    Ok(())
}
