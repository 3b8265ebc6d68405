use crate::models::Mode;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Mode courant partagé entre l'ordonnanceur, l'acceptor contrôle et les ingestors.
///
/// Le verrou est asynchrone : il reste tenu pendant toute une diffusion
/// (mise à jour + notification des clients), voir [`ModeState::lock`].
#[derive(Clone, Debug, Default)]
pub struct ModeState {
    current: Arc<tokio::sync::Mutex<Mode>>,
}

impl ModeState {
    pub fn new(initial: Mode) -> Self {
        Self {
            current: Arc::new(tokio::sync::Mutex::new(initial)),
        }
    }

    /// Attend la fin d'une éventuelle diffusion en cours
    pub async fn get(&self) -> Mode {
        *self.current.lock().await
    }

    pub async fn set(&self, mode: Mode) {
        *self.current.lock().await = mode;
    }

    /// Section critique : tant que le guard vit, aucun autre changement de mode
    /// ni lecture ne peut s'intercaler.
    pub async fn lock(&self) -> ModeGuard<'_> {
        ModeGuard {
            inner: self.current.lock().await,
        }
    }
}

pub struct ModeGuard<'a> {
    inner: tokio::sync::MutexGuard<'a, Mode>,
}

impl ModeGuard<'_> {
    pub fn mode(&self) -> Mode {
        *self.inner
    }

    /// Remplace le mode et retourne l'ancien
    pub fn replace(&mut self, mode: Mode) -> Mode {
        std::mem::replace(&mut *self.inner, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_set() {
        let state = ModeState::new(Mode::NormalTraffic);
        assert_eq!(state.get().await, Mode::NormalTraffic);

        state.set(Mode::TcpFlood).await;
        assert_eq!(state.get().await, Mode::TcpFlood);
    }

    #[tokio::test]
    async fn test_guard_replace() {
        let state = ModeState::default();
        let mut guard = state.lock().await;
        assert_eq!(guard.replace(Mode::HttpFlood), Mode::NormalTraffic);
        assert_eq!(guard.mode(), Mode::HttpFlood);
        drop(guard);

        assert_eq!(state.get().await, Mode::HttpFlood);
    }

    #[tokio::test]
    async fn test_reader_waits_for_guard_release() {
        let state = ModeState::default();
        let mut guard = state.lock().await;
        guard.replace(Mode::UdpFlood);

        let reader = state.clone();
        let pending = tokio::spawn(async move { reader.get().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        assert_eq!(pending.await.unwrap(), Mode::UdpFlood);
    }
}
