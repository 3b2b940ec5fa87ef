use anyhow::Context;
use todo_web::config::Config;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    todo_web::rocket_instance(config)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed to launch: {}", e))?;

    Ok(())
}
