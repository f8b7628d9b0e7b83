use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::types::Role;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "Role to embed: admin, teacher or student")]
    pub role: Role,
    #[arg(long, help = "Caller id (random when omitted)")]
    pub id: Option<Uuid>,
    #[arg(long, help = "Lifetime in hours (defaults to configuration)")]
    pub hours: Option<u64>,
}

/// Mint a bearer token signed with the configured JWT_SECRET
pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let id = args.id.unwrap_or_else(Uuid::new_v4);
    let claims = Claims::new(id, args.role, args.hours.unwrap_or(security.jwt_expiry_hours));
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    output_success(
        &output_format,
        json!({ "token": token, "id": id, "role": args.role, "exp": claims.exp }),
        &[token.clone()],
    )
}
