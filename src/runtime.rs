// Fixed-rate drive loop with watchdog
// Note: the watchdog stops the robot when teleop goes quiet, so a crashed
// command source can't leave the wheels running.
// Encoder moves get their own timeout; the drive core has none.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

// local imports
use crate::config::{RuntimeConfig, TOPIC_CMD_DRIVE, TOPIC_HEALTH, TOPIC_RT_WHEELS};
use crate::drive::controller::MecanumDrive;
use crate::drive::hal::{Actuator, Clock, DriveError, HeadingSensor, MonotonicClock};
use crate::drive::kinematics::{MotionVector, WheelPowers, map_vector};
use crate::messages::{DriveCommand, RuntimeHealth, WheelActuation};
use crate::sim::{SimImu, sim_wheels, step_drivetrain};

pub struct Runtime<A, G, C> {
    drive: MecanumDrive<A, G, C>,
    cmd_timeout: Duration,
    move_timeout: Duration,
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    move_started_at: Option<Instant>,
    powers: WheelPowers,
    health: RuntimeHealth,
}

impl<A, G, C> Runtime<A, G, C>
where
    A: Actuator,
    G: HeadingSensor,
    C: Clock,
{
    pub fn new(drive: MecanumDrive<A, G, C>, config: &RuntimeConfig) -> Self {
        Self {
            drive,
            cmd_timeout: config.cmd_timeout,
            move_timeout: config.move_timeout,
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            move_started_at: None,
            powers: WheelPowers::zero(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn drive_mut(&mut self) -> &mut MecanumDrive<A, G, C> {
        &mut self.drive
    }

    /// Process incoming command
    ///
    /// Encoder moves and stop act immediately; continuous commands are kept and
    /// applied on each tick.
    pub fn on_command(&mut self, cmd: DriveCommand, now: Instant) {
        info!("Received command: {:?}", &cmd);
        self.cmd_received_at = now;

        if let Some(request) = cmd.move_request() {
            self.latest_cmd = None;
            match self.drive.arm(request) {
                Ok(_) => {
                    self.move_started_at = Some(now);
                    self.powers = request.powers().clamped();
                    self.health = RuntimeHealth::Moving;
                }
                Err(e) => self.fault(e),
            }
        } else if cmd == DriveCommand::Stop {
            self.latest_cmd = None;
            self.move_started_at = None;
            self.halt();
            self.health = RuntimeHealth::Ok;
        } else {
            self.move_started_at = None;
            self.latest_cmd = Some(cmd);
        }
    }

    /// Run one control tick and return what the wheels were told
    pub fn tick(&mut self, now: Instant) -> WheelActuation {
        if let Some(started) = self.move_started_at {
            self.poll_move(started, now);
        } else {
            self.apply_continuous(now);
        }
        WheelActuation::from(&self.powers)
    }

    fn poll_move(&mut self, started: Instant, now: Instant) {
        match self.drive.is_moving() {
            Ok(true) => {
                let age = now.saturating_duration_since(started);
                if age > self.move_timeout {
                    warn!("Encoder move still running after {:?}, stopping robot", age);
                    self.move_started_at = None;
                    self.halt();
                    self.health = RuntimeHealth::MoveTimeout;
                } else {
                    self.health = RuntimeHealth::Moving;
                }
            }
            Ok(false) => {
                info!("Encoder move complete");
                self.move_started_at = None;
                self.halt();
                self.health = RuntimeHealth::Ok;
            }
            Err(e) => self.fault(e),
        }
    }

    fn apply_continuous(&mut self, now: Instant) {
        let Some(cmd) = self.latest_cmd else {
            // Nothing to do; keep any terminal status from the last move
            if self.health == RuntimeHealth::Ok {
                self.health = RuntimeHealth::CmdStale;
            }
            return;
        };

        let cmd_age = now.saturating_duration_since(self.cmd_received_at);
        if cmd_age > self.cmd_timeout {
            // Watchdog triggered - stop the robot
            warn!("Command stale ({:?} old), stopping robot", cmd_age);
            self.latest_cmd = None;
            self.halt();
            self.health = RuntimeHealth::CmdStale;
            return;
        }

        let result = match cmd {
            DriveCommand::Drive {
                direction,
                magnitude,
                rotation,
            } => self
                .drive
                .drive(MotionVector::new(direction, magnitude), rotation),
            DriveCommand::Joystick { x, y, turn } => self.drive.drive_joystick(x, y, turn),
            DriveCommand::TurnToHeading { target, power } => self
                .drive
                .turn_to_heading(target, power)
                .map(|rotation| map_vector(0.0, 0.0, rotation).clamped()),
            _ => return,
        };

        match result {
            Ok(powers) => {
                self.powers = powers;
                self.health = RuntimeHealth::Ok;
            }
            Err(e) => self.fault(e),
        }
    }

    fn halt(&mut self) {
        self.powers = WheelPowers::zero();
        if let Err(e) = self.drive.stop() {
            error!("Failed to stop wheels: {}", e);
        }
    }

    fn fault(&mut self, e: DriveError) {
        error!("Drive fault: {}", e);
        self.latest_cmd = None;
        self.move_started_at = None;
        self.halt();
        self.health = RuntimeHealth::Fault;
    }
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let topic_cmd = config.topic(TOPIC_CMD_DRIVE);
    let topic_wheels = config.topic(TOPIC_RT_WHEELS);
    let topic_health = config.topic(TOPIC_HEALTH);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(topic_cmd.clone()).await?;
    let pub_wheels = session.declare_publisher(topic_wheels.clone()).await?;
    let pub_health = session.declare_publisher(topic_health.clone()).await?;

    // No motor bus here: the drivetrain is simulated
    let drive = MecanumDrive::new(
        &config.drive,
        sim_wheels(),
        SimImu::new(),
        MonotonicClock::new(),
    )?;
    let mut runtime = Runtime::new(drive, &config);
    let period = config.tick_period();
    let mut tick = interval(period);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {}s move timeout",
        config.loop_hz,
        config.cmd_timeout.as_millis(),
        config.move_timeout.as_secs()
    );
    info!("Subscribed to: {}", topic_cmd);
    info!("Publishing to: {}, {}", topic_wheels, topic_health);

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending commands (non-blocking), handle each in order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd, now);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Run the drive tick (includes watchdog logic)
        let actuation = runtime.tick(now);

        // 3. Advance the simulated chassis
        let (wheels, imu) = runtime.drive_mut().hardware_mut();
        step_drivetrain(wheels, imu, period.as_secs_f64());

        // 4. Publish actuation
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_wheels.put(actuation_json).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;
    use crate::sim::{FixedStepClock, SimWheel};

    const DT: f64 = 0.02;

    type SimRuntime = Runtime<SimWheel, SimImu, FixedStepClock>;

    fn runtime() -> SimRuntime {
        let drive = MecanumDrive::new(
            &DriveConfig::default(),
            sim_wheels(),
            SimImu::new(),
            FixedStepClock::new(DT),
        )
        .unwrap();
        Runtime::new(drive, &RuntimeConfig::default())
    }

    fn step_sim(rt: &mut SimRuntime) {
        let (wheels, imu) = rt.drive_mut().hardware_mut();
        step_drivetrain(wheels, imu, DT);
    }

    fn forward() -> DriveCommand {
        DriveCommand::Drive {
            direction: 0.0,
            magnitude: 0.5,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_stale_until_first_command() {
        let mut rt = runtime();
        let out = rt.tick(Instant::now());
        assert_eq!(out, WheelActuation::default());
        assert_eq!(rt.health(), RuntimeHealth::CmdStale);
    }

    #[test]
    fn test_watchdog_stops_continuous_command() {
        let mut rt = runtime();
        let t0 = Instant::now();
        rt.on_command(forward(), t0);

        let out = rt.tick(t0 + Duration::from_millis(20));
        assert!(out.front_left > 0.0);
        assert_eq!(rt.health(), RuntimeHealth::Ok);

        let out = rt.tick(t0 + Duration::from_millis(300));
        assert_eq!(out, WheelActuation::default());
        assert_eq!(rt.health(), RuntimeHealth::CmdStale);
        assert_eq!(rt.drive_mut().wheels().front_left.power, 0.0);
    }

    #[test]
    fn test_encoder_move_runs_to_completion() {
        let mut rt = runtime();
        let mut now = Instant::now();
        rt.on_command(
            DriveCommand::Straight {
                inches: 6.0,
                power: 0.8,
            },
            now,
        );
        assert_eq!(rt.health(), RuntimeHealth::Moving);

        let mut ticks = 0;
        loop {
            now += Duration::from_millis(20);
            rt.tick(now);
            if rt.health() != RuntimeHealth::Moving {
                break;
            }
            step_sim(&mut rt);
            ticks += 1;
            assert!(ticks < 500, "move never finished");
        }
        assert_eq!(rt.health(), RuntimeHealth::Ok);
        assert_eq!(rt.drive_mut().wheels().front_left.power, 0.0);
    }

    #[test]
    fn test_encoder_move_times_out() {
        let mut rt = runtime();
        let t0 = Instant::now();
        // Zero power never reaches the target
        rt.on_command(
            DriveCommand::Strafe {
                inches: 6.0,
                power: 0.0,
            },
            t0,
        );
        rt.tick(t0 + Duration::from_secs(1));
        assert_eq!(rt.health(), RuntimeHealth::Moving);

        rt.tick(t0 + Duration::from_secs(11));
        assert_eq!(rt.health(), RuntimeHealth::MoveTimeout);
    }

    #[test]
    fn test_stop_command_cancels_move() {
        let mut rt = runtime();
        let t0 = Instant::now();
        rt.on_command(
            DriveCommand::Turn {
                degrees: 90.0,
                power: 0.5,
            },
            t0,
        );
        rt.on_command(DriveCommand::Stop, t0);
        let out = rt.tick(t0 + Duration::from_millis(20));
        assert_eq!(out, WheelActuation::default());
        assert!(!rt.drive_mut().is_moving().unwrap());
    }

    #[test]
    fn test_sensor_fault_stops_robot() {
        let mut rt = runtime();
        let t0 = Instant::now();
        rt.on_command(forward(), t0);
        rt.tick(t0);

        rt.drive_mut().imu_mut().fault = Some("disconnected".to_string());
        let out = rt.tick(t0 + Duration::from_millis(20));
        assert_eq!(out, WheelActuation::default());
        assert_eq!(rt.health(), RuntimeHealth::Fault);
        assert_eq!(rt.drive_mut().wheels().rear_right.power, 0.0);
    }

    #[test]
    fn test_turn_to_heading_command() {
        let mut rt = runtime();
        let t0 = Instant::now();
        rt.drive_mut().imu_mut().heading = -30.0;
        rt.on_command(
            DriveCommand::TurnToHeading {
                target: 0.0,
                power: 0.5,
            },
            t0,
        );
        let out = rt.tick(t0);
        assert_eq!(out.front_left, -0.5);
        assert_eq!(out.front_right, 0.5);
    }
}
