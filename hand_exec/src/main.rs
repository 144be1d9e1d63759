//! # Hand Control Executable
//!
//! Runs the hand controller against the simulated hand device, executing the
//! telecommands of a timed script. Every published joint state is archived
//! and every response saved into the session.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Archive of published joint states.
mod joint_archive;

/// Parameters for the hand executable.
mod params;

/// Telecommand execution.
mod tc_processor;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{error, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use hand_lib::{
    device::sim::{SimHand, SimJoint},
    hand_ctrl::HandCtrl,
};
use joint_archive::JointStateArchive;
use params::HandExecParams;
use tc_processor::TcExecError;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "hand_exec", about = "Hand control executable")]
struct Args {
    /// Parameter file, relative to the params directory of the software root
    #[structopt(long, default_value = "hand_exec.toml")]
    params: String,

    /// Telecommand script to execute
    #[structopt(parse(from_os_str))]
    script: PathBuf,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let args = Args::from_args();

    // Initialise session
    let session = Session::new("hand_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Hand Control Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| String::from("unknown host"))
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: HandExecParams =
        util::params::load(&args.params).wrap_err("Failed to load the parameters")?;

    info!("Parameters loaded");

    if !(params.cycle_period_s > 0.0) {
        return Err(eyre!(
            "The cycle period must be positive, found {}",
            params.cycle_period_s
        ));
    }

    // ---- LOAD SCRIPT ----

    let mut script = ScriptInterpreter::new(&args.script).wrap_err("Failed to load the script")?;

    info!(
        "Loaded script {:?}: {} TCs over {:.3} s",
        args.script,
        script.get_num_tcs(),
        script.get_duration()
    );

    // ---- DEVICE INITIALISATION ----

    let sim_joints: Vec<SimJoint> = params
        .hand
        .joints
        .iter()
        .enumerate()
        .map(|(i, j)| SimJoint {
            node_id: j.node_id.unwrap_or(i as u16 + 1),
            motor_direction: j.motor_direction.unwrap_or(1) as i32,
            sensor_zero_value: j.sensor_zero_value.unwrap_or(0),
            sensor_direction: j.sensor_direction.unwrap_or(1) as i32,
            initial_angle_deg: params.sim.initial_angles_deg.get(i).copied().unwrap_or(0.0),
        })
        .collect();
    let sim = SimHand::new(sim_joints, params.sim.counts_per_step);
    // Nothing reads the command log during a run
    sim.set_command_log_capacity(0);

    info!("Simulated hand created with {} joints", params.hand.joints.len());

    // ---- MODULE INITIALISATION ----

    let mut hand = HandCtrl::new(sim.bus());
    hand.init(params.hand.clone())
        .wrap_err("Failed to initialise HandCtrl")?;
    hand.set_sensor_feed(Box::new(sim.sensor_feed()));
    hand.set_observer(Box::new(
        JointStateArchive::new(&session, hand.num_joints())
            .wrap_err("Failed to create the joint state archive")?,
    ));

    info!("HandCtrl init complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(params.cycle_period_s);
    let script_start = Instant::now();
    let mut tc_index = 0;

    'main: loop {
        let cycle_start_instant = Instant::now();

        // ---- DATA INPUT ----

        if let Err(e) = hand.poll_feed() {
            warn!("Could not process the sensor batch: {}", e);
        }

        // ---- TELECOMMAND PROCESSING ----

        match script.get_pending_tcs(script_start.elapsed().as_secs_f64()) {
            PendingTcs::None => (),
            PendingTcs::Some(tcs) => {
                for tc in tcs.iter() {
                    tc_index += 1;

                    match tc_processor::exec(&mut hand, &session, tc_index, tc) {
                        Ok(()) => (),
                        Err(TcExecError::Hand(e)) if e.is_fatal() => {
                            error!("Fatal error executing TC {}: {}", tc_index, e);
                            hand.make_safe();
                            return Err(e).wrap_err("Hand control failed");
                        }
                        Err(e) => warn!("Could not execute TC {}: {}", tc_index, e),
                    }
                }
            }
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                break 'main;
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                (cycle_dur - cycle_period).as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    let failures = hand.make_safe();
    if !failures.is_empty() {
        warn!("{} motor failures while making safe", failures.len());
    }

    drop(hand);
    session.exit();

    Ok(())
}
