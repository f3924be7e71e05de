use anyhow::Context;
use log::{debug, info, warn};

use crate::conf::AConf;
use crate::error::JobError;
use crate::job::supervisor::{JobHandle, Supervisor};

use self::dispatch::{Action, Dispatcher};
use self::render::{Line, TerminalSession};

pub mod dispatch;
pub mod info;
pub mod render;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    ShowInfo(usize),
}

/// Dashboard state: the supervisor, the key dispatcher and the handles of
/// workers started from the keyboard.
pub struct App {
    sup: Supervisor,
    dispatcher: Dispatcher,
    conf: AConf,
    handles: Vec<JobHandle>,
}

impl App {
    pub fn new(sup: Supervisor, conf: AConf) -> Self {
        let dispatcher = Dispatcher::new(sup.devices().len(), conf.quit_enabled);
        Self{
            sup,
            dispatcher,
            conf,
            handles: Vec::new(),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.sup
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn frame(&self) -> Vec<Line> {
        let snaps = self.sup.table().snapshot_all();
        let rows: Vec<_> = self.sup.devices().iter()
            .zip(snaps.into_iter())
            .map(|(dev, (_, snap))| (dev.info(), snap))
            .collect();
        render::dashboard(&rows, self.dispatcher.selected(), self.dispatcher.quit_enabled())
    }

    /// Identity and SMART data of the device at `idx`, read on demand.
    pub fn info_view(&self, idx: usize) -> Vec<Line> {
        match self.sup.devices().get(idx) {
            Some(dev) => info::info_lines(dev.info(), &dev.read_smart(), &dev.smart_status()),
            None => Vec::new(),
        }
    }

    fn serial(&self, idx: usize) -> Option<String> {
        self.sup.devices().get(idx).map(|d| d.info().serial.clone())
    }

    pub fn apply(&mut self, action: Action) -> Flow {
        match action {
            Action::None | Action::Select(_) => Flow::Continue,
            Action::Info(idx) => Flow::ShowInfo(idx),
            Action::Quit => Flow::Quit,
            Action::Start(idx, kind) => {
                if let Some(serial) = self.serial(idx) {
                    match self.sup.start(&serial, kind) {
                        Ok(handle) => self.handles.push(handle),
                        // the row already shows what is running
                        Err(JobError::AlreadyBusy{ .. }) => debug!("{}: busy, {:?} ignored",serial,kind),
                        Err(e) => warn!("{}",e),
                    }
                }
                Flow::Continue
            }
            Action::Stop(idx) => {
                if let Some(serial) = self.serial(idx) {
                    if let Err(e) = self.sup.stop(&serial) {
                        warn!("{}",e);
                    }
                }
                Flow::Continue
            }
        }
    }

    /// Forget workers that have exited.
    pub fn reap(&mut self) {
        let mut i = 0;
        while i < self.handles.len() {
            if self.handles[i].is_finished() {
                let handle = self.handles.swap_remove(i);
                if handle.join().is_err() {
                    warn!("a worker panicked");
                }
            } else {
                i += 1;
            }
        }
    }

    pub fn running(&self) -> usize {
        self.handles.len()
    }

    /// Stop every device and wait for all workers.
    pub fn shutdown(&mut self) {
        for serial in self.sup.table().serials() {
            let _ = self.sup.stop(serial);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("a worker panicked");
            }
        }
    }

    fn event_loop(&mut self, term: &mut TerminalSession) -> anyhow::Result<()> {
        loop {
            term.draw(&self.frame())?;
            self.reap();
            let key = match term.poll_key(self.conf.tick)? {
                Some(key) => key,
                None => continue,
            };
            let action = self.dispatcher.handle(key);
            match self.apply(action) {
                Flow::Continue => {}
                Flow::Quit => return Ok(()),
                Flow::ShowInfo(idx) => {
                    term.clear()?;
                    term.draw(&self.info_view(idx))?;
                    term.wait_key()?;
                    term.clear()?;
                }
            }
        }
    }

    /// Run the dashboard until Quit. Workers are stopped and joined on every
    /// exit path, terminal errors included.
    pub fn run(mut self) -> anyhow::Result<()> {
        let mut term = TerminalSession::enter().context("enter terminal")?;
        info!("dashboard up with {} devices",self.sup.devices().len());
        let res = self.event_loop(&mut term);
        self.wind_down(res)
    }

    /// Stop and join all workers whatever ended the loop, then pass its result on.
    fn wind_down(&mut self, res: anyhow::Result<()>) -> anyhow::Result<()> {
        match &res {
            Ok(()) => info!("quit, stopping {} workers",self.handles.len()),
            Err(e) => warn!("terminal failed, stopping {} workers: {:#}",self.handles.len(),e),
        }
        self.shutdown();
        res
    }
}
