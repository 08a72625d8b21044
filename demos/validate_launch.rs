use lti13::{decode_launch_token, inspect_launch, validate_claims, LaunchCheck};
use std::collections::HashMap;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let id_token = match env::var("LTI_ID_TOKEN") {
        Ok(value) => value,
        Err(_) => {
            eprintln!("LTI_ID_TOKEN is not set. Skipping.");
            eprintln!("Example: LTI_ID_TOKEN=eyJhbGciOi...");
            return Ok(());
        }
    };
    let strict = env::var("LTI_STRICT").map(|v| v == "1").unwrap_or(false);

    let mut request = HashMap::new();
    request.insert("id_token".to_string(), id_token.clone());
    match inspect_launch(&request) {
        LaunchCheck::NoToken => {
            println!("not a launch: no id_token");
            return Ok(());
        }
        LaunchCheck::Invalid(reason) => {
            println!("not a launch: {reason}");
            return Ok(());
        }
        LaunchCheck::Valid => {}
    }

    let launch = decode_launch_token(&id_token, true)?;
    println!("issuer:       {:?}", launch.body.iss);
    println!("message type: {:?}", launch.body.message_type);
    println!("deployment:   {:?}", launch.body.deployment_id);

    let failures = validate_claims(&launch.body, strict);
    if failures.is_empty() {
        println!("claims ok (strict={strict})");
    } else {
        for failure in &failures {
            println!("failure: {failure}");
        }
    }
    Ok(())
}
