#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    fillmeup_server::run().await
}
