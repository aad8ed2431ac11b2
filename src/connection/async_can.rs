use crate::Filter;

/// The raw CAN socket a [`Connection`](super::Connection) runs on.
///
/// Implementations own exactly one socket or controller channel. `open` and
/// `close` default to no-ops so in-memory drivers only provide the two data
/// paths.
pub trait AsyncCan {
    type Error;

    type Frame: embedded_can::Frame;

    /// Bind the underlying socket, installing receive filters. Filters are
    /// a hint; the connection re-checks addresses on every inbound frame.
    fn open(&mut self, filters: &[Filter]) -> Result<(), Self::Error> {
        let _ = filters;
        Ok(())
    }

    async fn send(&mut self, frame: Self::Frame) -> Result<(), Self::Error>;

    async fn receive(&mut self) -> Result<Self::Frame, Self::Error>;

    /// Release the socket. Called once, when the owning connection goes
    /// away.
    fn close(&mut self) {}
}

impl<T> AsyncCan for &mut T
where
    T: AsyncCan,
{
    type Error = T::Error;
    type Frame = T::Frame;

    fn open(&mut self, filters: &[Filter]) -> Result<(), Self::Error> {
        (*self).open(filters)
    }

    async fn send(&mut self, frame: Self::Frame) -> Result<(), Self::Error> {
        (*self).send(frame).await
    }

    async fn receive(&mut self) -> Result<Self::Frame, Self::Error> {
        (*self).receive().await
    }

    fn close(&mut self) {
        (*self).close()
    }
}
