//! Running `'static` futures on the UI thread.
//!
//! The map core holds `Rc` state, so its futures are not `Send`. On wasm
//! they go to the browser's microtask queue; natively every source resolves
//! without real I/O, so the future is driven to completion inline.

use std::future::Future;

#[cfg(target_arch = "wasm32")]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    pollster::block_on(future);
}
