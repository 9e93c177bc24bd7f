#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("queue is full")]
    QueueFull,
}
