mod cli;
mod commands;
mod demo;
mod infra;
mod routes;
mod server;

use sales_intel::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
