use async_trait::async_trait;
use eyre::Result;

pub mod preferences;
pub mod shell;
pub mod store;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
