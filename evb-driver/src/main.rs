//! Event builder demo driver - wires an [`EventBuilder`]/[`Outlet`] pair to
//! a [`LoopbackFabric`] and feeds it synthetic contributions.
//!
//! Usage: evb-driver <contributor_addr> [<contributor_addr> ...] [-B <port>] [-P <port>] [-i <id>] [-v] [-h]
//!
//! There is no real fabric transport here (that's an external collaborator);
//! each contributor address just names one simulated producer whose
//! fragments are fed into the loopback fabric's inbound queue on its own
//! thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use evb_core::capability::{Capabilities, OrReduceCapabilities};
use evb_core::fabric::PendOutcome;
use evb_core::{Config, EventBuilder, EventResult, Fragment, FragmentHeader, LoopbackFabric, Metrics, Outlet, OutletWorker, Pool};

/// How often the inlet loop wakes up even with no contributor sending
/// anything, so `builder.tick` still runs and stalled events still expire.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

struct Options {
    contributors: Vec<String>,
    srv_port: u16,
    clt_port: u16,
    instance_id: u8,
    verbose: bool,
}

fn usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {program} [OPTIONS] <contributor_addr> [<contributor_addr> [...]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -B <srv_port>   Builder's port number (server: 32768)");
    eprintln!("  -P <clt_port>   Contributor port number (client: 32769)");
    eprintln!("  -i <id>         Unique ID this instance should assume (0 - 63) (default: 0)");
    eprintln!("  -v              enable debugging output");
    eprintln!("  -h              display this help output");
}

fn parse_args(program: &str, args: &[String]) -> Result<Options, i32> {
    let mut contributors = Vec::new();
    let mut srv_port = 32768u16;
    let mut clt_port = 32769u16;
    let mut instance_id = 0u8;
    let mut verbose = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" => {
                usage(program);
                return Err(0);
            }
            "-v" => verbose = true,
            "-B" | "-P" | "-i" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    usage(program);
                    return Err(1);
                };
                match args[i - 1].as_str() {
                    "-B" => srv_port = value.parse().map_err(|_| 1)?,
                    "-P" => clt_port = value.parse().map_err(|_| 1)?,
                    "-i" => instance_id = value.parse().map_err(|_| 1)?,
                    _ => unreachable!(),
                }
            }
            other if other.starts_with('-') => {
                eprintln!("unrecognized option: {other}");
                usage(program);
                return Err(1);
            }
            other => contributors.push(other.to_string()),
        }
        i += 1;
    }

    if contributors.is_empty() {
        eprintln!("Contributor address(s) is required");
        return Err(1);
    }
    if instance_id >= 64 {
        eprintln!("instance id must be in 0..64");
        return Err(1);
    }

    Ok(Options { contributors, srv_port, clt_port, instance_id, verbose })
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let options = match parse_args(&argv[0], &argv[1..]) {
        Ok(options) => options,
        Err(code) => std::process::exit(code),
    };

    if options.verbose {
        println!("Parameters:");
        println!("  server port:      {}", options.srv_port);
        println!("  contributor port: {}", options.clt_port);
        println!("  instance id:      {}", options.instance_id);
        println!("  contributors:     {:?}", options.contributors);
    }

    let config = Config::default();
    let contract = if options.contributors.len() >= 64 {
        u64::MAX
    } else {
        (1u64 << options.contributors.len()) - 1
    };

    let results_pool = Arc::new(Pool::new(config.results_pool_size));
    let metrics = Arc::new(Metrics::new());
    let mut builder = EventBuilder::new(FixedContract(contract), config.timeout_epochs, results_pool.clone(), metrics.clone());
    let (mut outlet, receiver) = Outlet::new(config.batch_pool_size, config.max_entries, config.batch_duration);

    let fabric = Arc::new(LoopbackFabric::new(options.contributors.len()));
    let worker = Arc::new(OutletWorker::new(receiver, results_pool, fabric.clone(), config.max_batch_size, metrics.clone()));

    let running = Arc::new(AtomicBool::new(true));
    let abort_calls = Arc::new(AtomicUsize::new(0));
    {
        let running = running.clone();
        let fabric = fabric.clone();
        let abort_calls = abort_calls.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            fabric.shutdown();
            if abort_calls.fetch_add(1, Ordering::SeqCst) > 0 {
                std::process::abort();
            }
        })
        .expect("failed to install signal handler");
    }

    let outlet_thread = {
        let worker = worker.clone();
        thread::spawn(move || worker.run())
    };

    for (producer_id, address) in options.contributors.iter().enumerate() {
        let fabric = fabric.clone();
        let running = running.clone();
        let address = address.clone();
        thread::spawn(move || feed_contributor(producer_id as u8, &address, &fabric, &running));
    }

    let mut epoch = 0u64;
    while running.load(Ordering::Relaxed) {
        match fabric.pend_timeout(TICK_INTERVAL) {
            PendOutcome::Fragment(inbound) => {
                // SAFETY: valid until the fabric's next `pend`; parsed and
                // dropped before that can happen.
                let bytes = unsafe { inbound.as_bytes() };
                match Fragment::parse(bytes) {
                    Ok(fragment) => {
                        if let Err(error) = builder.process(&fragment, &mut outlet) {
                            eprintln!("process failed: {error}");
                        }
                    }
                    Err(error) => eprintln!("bad fragment: {error}"),
                }
            }
            PendOutcome::TimedOut => {}
            PendOutcome::Shutdown => break,
        }
        // Runs every wake, fragment or timeout, so a contributor that goes
        // silent still gets its stalled event force-completed by `fixup`
        // instead of pinning the results pool indefinitely.
        epoch += 1;
        if let Err(error) = builder.tick(epoch, &mut outlet) {
            eprintln!("tick failed: {error}");
        }
    }

    let _ = outlet.flush();
    drop(outlet);
    let _ = outlet_thread.join();
    println!("{}", metrics.snapshot());
}

struct FixedContract(u64);
impl Capabilities for FixedContract {
    fn contract(&self, _first_fragment: &Fragment) -> u64 {
        self.0
    }
    fn reduce(&self, result: &mut EventResult, fragment: &Fragment) {
        OrReduceCapabilities.reduce(result, fragment);
    }
    fn fixup(&self, result: &mut EventResult, missing_producer: u8) {
        OrReduceCapabilities.fixup(result, missing_producer);
    }
}

/// Stands in for a real contributor: synthesizes one fragment per tick and
/// delivers it into the fabric's inbound queue.
fn feed_contributor(producer_id: u8, address: &str, fabric: &LoopbackFabric, running: &AtomicBool) {
    let mut pulse_id = 0u64;
    let started = Instant::now();
    while running.load(Ordering::Relaxed) {
        let header = FragmentHeader {
            pulse_id,
            service: 0,
            source_tag: FragmentHeader::pack_source_tag(producer_id, 0),
            extent: 20,
        };
        let payload = [1u32, 0, 0, 0, 0];
        let mut bytes = bytemuck::bytes_of(&header).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(&payload));
        fabric.deliver(bytes);
        pulse_id += 1;
        thread::sleep(Duration::from_millis(10));
        if started.elapsed() > Duration::from_secs(60) {
            eprintln!("contributor {address} demo feed timed out");
            break;
        }
    }
}
