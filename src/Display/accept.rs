use super::collaborators::{Canvas, CutView, NoCut, Surfaces};
use crate::error::{IpcError, Result};
use crate::Protocol::{decode, Batch};
use crate::Queue::{Consumer, DrainReport};
use crate::Store::{Dirty, Store1d, Store2d};

const TOUCHED_1D: u8 = 1;
const TOUCHED_2D: u8 = 2;

/// Display side of a session: drains the queue into the stores and tells the
/// surfaces what to redraw.
///
/// The first fatal error ends the session. It is logged and returned once,
/// afterwards every call fails with [`IpcError::SessionFailed`].
pub struct Acceptor<S, C = NoCut> {
    consumer: Consumer,
    store_1d: Option<Store1d>,
    store_2d: Option<Store2d>,
    surfaces: S,
    cut: C,
    failed: bool,
}

impl<S: Surfaces> Acceptor<S, NoCut> {
    pub fn new(consumer: Consumer, surfaces: S) -> Self {
        Self {
            consumer,
            store_1d: None,
            store_2d: None,
            surfaces,
            cut: NoCut,
            failed: false,
        }
    }
}

impl<S: Surfaces, C: CutView> Acceptor<S, C> {
    pub fn with_1d(mut self, store: Store1d) -> Self {
        self.store_1d = Some(store);
        self
    }

    pub fn with_2d(mut self, store: Store2d) -> Self {
        self.store_2d = Some(store);
        self
    }

    pub fn with_cut<K: CutView>(self, cut: K) -> Acceptor<S, K> {
        Acceptor {
            consumer: self.consumer,
            store_1d: self.store_1d,
            store_2d: self.store_2d,
            surfaces: self.surfaces,
            cut,
            failed: self.failed,
        }
    }

    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub fn store_1d(&self) -> Option<&Store1d> {
        self.store_1d.as_ref()
    }

    pub fn store_1d_mut(&mut self) -> Option<&mut Store1d> {
        self.store_1d.as_mut()
    }

    pub fn store_2d(&self) -> Option<&Store2d> {
        self.store_2d.as_ref()
    }

    pub fn store_2d_mut(&mut self) -> Option<&mut Store2d> {
        self.store_2d.as_mut()
    }

    pub fn surfaces(&self) -> &S {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut S {
        &mut self.surfaces
    }

    pub fn cut(&self) -> &C {
        &self.cut
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Run one drain cycle.
    ///
    /// With `drain_all` (the producer has exited) the queue is drained up to
    /// the first request regardless of the time budget. Redraws happen after
    /// all entries of the cycle were applied, once per dirty canvas.
    pub fn accept_new_data(&mut self, drain_all: bool) -> Result<DrainReport> {
        if self.failed {
            return Err(IpcError::SessionFailed);
        }

        if let Some(store) = self.store_1d.as_mut() {
            store.reset_dirty();
        }
        if let Some(store) = self.store_2d.as_mut() {
            store.reset_dirty();
        }

        let mut touched = 0u8;
        let Self {
            consumer,
            store_1d,
            store_2d,
            cut,
            ..
        } = self;

        let drained = consumer.dequeue_batch(drain_all, |kind, bytes| {
            match decode(kind, bytes)? {
                Batch::Data1d(records) => {
                    let store = store_1d.as_mut().ok_or(IpcError::NoDisplay("1D"))?;
                    touched |= TOUCHED_1D;
                    records.iter().try_for_each(|r| store.apply(r))
                }
                Batch::Command1d(command) => {
                    let store = store_1d.as_mut().ok_or(IpcError::NoDisplay("1D"))?;
                    touched |= TOUCHED_1D;
                    store.command(&command)
                }
                Batch::Data2d(records) => {
                    let store = store_2d.as_mut().ok_or(IpcError::NoDisplay("2D"))?;
                    touched |= TOUCHED_2D;
                    records.iter().try_for_each(|r| store.apply(r, &mut *cut))
                }
                Batch::Command2d(command) => {
                    let store = store_2d.as_mut().ok_or(IpcError::NoDisplay("2D"))?;
                    touched |= TOUCHED_2D;
                    store.command(&command, &mut *cut)
                }
            }
        });

        match drained {
            Ok(report) => {
                self.redraw(touched);
                Ok(report)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Consume the request the last drain cycle stopped at.
    pub fn take_request(&mut self) -> Result<Option<Vec<u8>>> {
        if self.failed {
            return Err(IpcError::SessionFailed);
        }
        self.consumer.take_request().map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: IpcError) -> IpcError {
        self.failed = true;
        tracing::error!(%err, "display session failed, no further data is accepted");
        err
    }

    fn redraw(&mut self, touched: u8) {
        if touched & TOUCHED_1D != 0 {
            let dirty = self.store_1d.as_ref().map(Store1d::dirty).unwrap_or_default();
            for canvas in canvases(dirty) {
                self.surfaces.redraw_canvas_1d(canvas);
            }
        }
        if touched & TOUCHED_2D != 0 {
            let dirty = self.store_2d.as_ref().map(Store2d::dirty).unwrap_or_default();
            for canvas in canvases(dirty) {
                self.surfaces.redraw_canvas_2d(canvas);
            }
        }
    }
}

// The main canvas is redrawn whenever its dimension saw any entry.
fn canvases(dirty: Dirty) -> impl Iterator<Item = Canvas> {
    [
        (true, Canvas::Main),
        (dirty.x_axis, Canvas::XAxis),
        (dirty.y_axis, Canvas::YAxis),
        (dirty.z_axis, Canvas::ZAxis),
        (dirty.cut, Canvas::Cut),
    ]
    .into_iter()
    .filter_map(|(on, canvas)| on.then_some(canvas))
}
