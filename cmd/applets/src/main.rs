//! Applet demo
//!
//! Runs health responders and chunked writers on two scheduler threads and
//! reports the live-applet counter while they run and after shutdown.
//!
//! # Environment Variables
//!
//! - `APPLET_FLUSH_EPRINT=1` - Flush debug output immediately
//! - `APPLET_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `APPLET_BUFFERS=<n>` - Shared buffers per thread (try 1 to see buffer waits)

use applet::{kdebug, kinfo};
use applet::{nb_applets, Appctx, Applet, AppletConfig, AppletCx, AppletStatus, Runtime};
use std::time::Duration;

/// Answers a health probe and closes
struct Health;

impl Applet for Health {
    fn name(&self) -> &'static str {
        "health"
    }

    fn handle(&self, ctx: &mut Appctx, _cx: &mut AppletCx<'_>) -> AppletStatus {
        ctx.scratch_mut().extend_from_slice(b"HTTP/1.1 200 OK\r\n\r\n");
        AppletStatus::Close
    }
}

/// Writes `st1` chunks, one shared buffer per run
///
/// `st0` counts chunks written so far.
struct Chunked;

impl Applet for Chunked {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn handle(&self, ctx: &mut Appctx, cx: &mut AppletCx<'_>) -> AppletStatus {
        let Some(mut buf) = cx.alloc_buffer(ctx) else {
            kdebug!("appctx {} waiting for a buffer", cx.id());
            return AppletStatus::Wait;
        };

        buf.extend_from_slice(format!("chunk {}\n", ctx.sub_state.st0).as_bytes());
        ctx.scratch_mut().extend_from_slice(&buf);
        cx.release_buffer(buf);

        ctx.sub_state.st0 += 1;
        if ctx.sub_state.st0 >= ctx.sub_state.st1 {
            AppletStatus::Close
        } else {
            AppletStatus::Yield
        }
    }
}

static HEALTH: Health = Health;
static CHUNKED: Chunked = Chunked;

// APPLET_LOG_LEVEL=debug cargo run -p applet-demo
fn main() {
    println!("=== Applet Demo ===\n");

    let config = AppletConfig::from_env();
    config.print();

    let mut runtime = match Runtime::new(config, 2) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("cannot create runtime: {}", e);
            std::process::exit(1);
        }
    };

    let started = runtime.start(|index, sched| {
        for _ in 0..8 {
            if let Ok(id) = sched.create_appctx(Some(&HEALTH)) {
                sched.wakeup_appctx(id);
            }
        }
        for i in 0..4 {
            let Ok(id) = sched.create_appctx(Some(&CHUNKED)) else {
                continue;
            };
            if let Some(ctx) = sched.appctx_mut(id) {
                ctx.sub_state.st1 = 3 + i;
            }
            sched.wakeup_appctx(id);
        }
        kinfo!("thread {} set up, {} applets live", index, sched.live_appctx());
    });
    if let Err(e) = started {
        eprintln!("cannot start runtime: {}", e);
        std::process::exit(1);
    }

    std::thread::sleep(Duration::from_millis(20));
    println!("live applets while running: {}", nb_applets());

    let stats = runtime.shutdown();
    for (i, s) in stats.iter().enumerate() {
        println!(
            "thread {}: created={} dispatched={} wakeups={} finalized={}+{} livelocks={}",
            i,
            s.created,
            s.dispatched,
            s.wakeups,
            s.finalized_now,
            s.finalized_deferred,
            s.livelocks
        );
    }
    println!("live applets after shutdown: {}", nb_applets());

    println!("\n=== Demo Complete ===");
}
