#[tokio::main]
async fn main() {
    bookworth::run().await;
}
