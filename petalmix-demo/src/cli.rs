use anyhow::{Context, Result, bail};
use petalmix_core::math::{Pose, Vec3};
use petalmix_core::{
    BufferId, CpalBackend, DeviceDesc, LoopMode, LoopbackBackend, PetalMixAudioData,
    PetalMixDevice, PetalMixEvent, PetalMixWorld, SampleFormat, SourceConfig, SourceId,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Radius of the orbit the demo source follows, in metres.
const ORBIT_RADIUS: f32 = 3.0;
/// Seconds per orbit.
const ORBIT_PERIOD: f32 = 6.0;

#[derive(Debug, Default)]
pub struct Options {
    positional: Vec<String>,
    seconds: Option<f32>,
    channels: Option<u16>,
}

impl Options {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--seconds" => {
                    let value = iter.next().context("--seconds needs a value")?;
                    options.seconds = Some(value.parse().context("invalid --seconds")?);
                }
                "--channels" => {
                    let value = iter.next().context("--channels needs a value")?;
                    options.channels = Some(value.parse().context("invalid --channels")?);
                }
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                _ => options.positional.push(arg.clone()),
            }
        }
        Ok(options)
    }

    fn seconds(&self) -> f32 {
        self.seconds.unwrap_or(12.0)
    }

    fn desc(&self) -> DeviceDesc {
        DeviceDesc::default().channels(self.channels.unwrap_or(2))
    }
}

pub fn list_devices() -> Result<()> {
    for name in CpalBackend::output_device_names()? {
        println!("{}", name);
    }
    Ok(())
}

/// Plays a looping source that circles the listener.
pub fn play(options: &Options) -> Result<()> {
    let device = PetalMixDevice::open(CpalBackend::new(), options.desc())?;
    let world = device.world().clone();
    let source = setup_scene(&world, options.positional.first().map(String::as_str))?;

    let started = Instant::now();
    let total = Duration::from_secs_f32(options.seconds());
    while started.elapsed() < total {
        orbit(&world, source, started.elapsed().as_secs_f32())?;
        report_events(&world);
        std::thread::sleep(Duration::from_millis(20));
    }

    world.stop(source)?;
    std::thread::sleep(Duration::from_millis(50));
    report_events(&world);
    log::info!(
        "Rendered {} frames, {} events dropped",
        world.stats().frames_rendered(),
        world.stats().dropped_events()
    );
    device.close()?;
    Ok(())
}

/// Renders the orbiting scene offline to raw interleaved 16-bit PCM.
pub fn render(options: &Options) -> Result<()> {
    let out_path = options
        .positional
        .first()
        .context("render needs an output path")?;
    let desc = options.desc().sample_format(SampleFormat::I16);
    let mut device = PetalMixDevice::open(LoopbackBackend::new(), desc)?;
    let world = device.world().clone();
    let source = setup_scene(&world, options.positional.get(1).map(String::as_str))?;

    let format = *device.format();
    let block = device.world().desc().block_size;
    let total_frames = (options.seconds() * format.sample_rate as f32) as usize;
    let mut bytes = vec![0u8; block * format.bytes_per_frame()];
    let mut writer = BufWriter::new(
        File::create(out_path).with_context(|| format!("creating {}", out_path))?,
    );

    let mut rendered = 0;
    while rendered < total_frames {
        let frames = block.min(total_frames - rendered);
        orbit(&world, source, rendered as f32 / format.sample_rate as f32)?;
        let written = device.backend_mut().pull(&mut bytes, frames);
        writer.write_all(&bytes[..written * format.bytes_per_frame()])?;
        rendered += written;
        report_events(&world);
    }
    writer.flush()?;

    log::info!(
        "Wrote {} frames of {} ch {:?} at {} Hz to {}",
        rendered,
        format.channels(),
        format.sample_format,
        format.sample_rate,
        out_path
    );
    device.close()?;
    Ok(())
}

fn setup_scene(world: &PetalMixWorld, path: Option<&str>) -> Result<SourceId> {
    let buffer = match path {
        Some(path) => load_buffer(world, path)?,
        None => {
            let rate = world.sample_rate();
            let tone: Vec<f32> = (0..rate)
                .map(|i| {
                    let t = i as f32 / rate as f32;
                    (t * 440.0 * std::f32::consts::TAU).sin() * 0.3
                })
                .collect();
            world.create_buffer_from_f32(tone, rate, 1)?
        }
    };

    world.set_listener_pose(Pose::identity())?;
    let config = SourceConfig::spatial(Vec3::new(0.0, 0.0, -ORBIT_RADIUS))
        .with_loop_mode(LoopMode::Infinite);
    let source = world.create_source(config)?;
    world.set_buffer(source, Some(buffer))?;
    world.play(source)?;
    log::info!("Playing {} around the listener", source);
    Ok(source)
}

fn load_buffer(world: &PetalMixWorld, path: &str) -> Result<BufferId> {
    let data = PetalMixAudioData::from_path(path)?;
    log::info!(
        "Loaded {}: {} ch, {} Hz, {:.2}s",
        path,
        data.channels(),
        data.sample_rate(),
        data.duration().as_secs_f32()
    );
    // Only mono buffers are positioned.
    let data = if data.channels() > 1 {
        Arc::new(data.to_mono())
    } else {
        data
    };
    Ok(world.add_buffer(data)?)
}

fn orbit(world: &PetalMixWorld, source: SourceId, seconds: f32) -> Result<()> {
    let angle = seconds / ORBIT_PERIOD * std::f32::consts::TAU;
    let position = Vec3::new(angle.sin(), 0.0, -angle.cos()) * ORBIT_RADIUS;
    // A full command queue only delays this update to the next tick.
    match world.update_source_params(source, |config| config.position = position) {
        Err(petalmix_core::PetalMixError::CommandQueueFull(_)) => Ok(()),
        other => Ok(other?),
    }
}

fn report_events(world: &PetalMixWorld) {
    for event in world.poll_events() {
        match event {
            PetalMixEvent::SourceLooped {
                source_id,
                loop_count,
            } => log::info!("{} looped ({} times)", source_id, loop_count),
            PetalMixEvent::BuffersProcessed { .. } => {}
            other => log::info!("{:?}", other),
        }
    }
}
