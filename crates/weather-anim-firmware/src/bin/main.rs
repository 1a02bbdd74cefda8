#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};

// Display-LCD panel specific imports
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, models::ILI9342CRgb565};

use weather_anim_core::Config;
use weather_anim_core::decode::BmpDecoder;
use weather_anim_core::display::{ColorDisplay, DisplayKind};
use weather_anim_core::orchestrator::{Mode, WeatherAnimations};
use weather_anim_core::source::{EntityState, ScriptedSource};

const DISPLAY_WIDTH: u16 = 320;
const DISPLAY_HEIGHT: u16 = 240;

/// Delay between orchestrator ticks (~30 FPS).
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Poll interval of the built-in demo script.
const DEMO_FETCH_INTERVAL_MS: u64 = 10_000;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Weather script shown until a network-backed source is wired in.
fn demo_source() -> ScriptedSource {
    let mut source = ScriptedSource::new().with_reading("sensor.indoor", "21.0");
    for (state, is_day) in [
        ("sunny", true),
        ("cloudy", true),
        ("rainy", true),
        ("snowy", false),
        ("lightning", false),
    ] {
        source.push_state(EntityState::new(state).with_daytime(is_day));
    }
    source
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    // 1. Configure SPI bus
    let spi_bus = Spi::new(peripherals.SPI2, SpiConfig::default())
        .expect("Failed to configure SPI bus")
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);

    // 2. Chip select, held by the device wrapper
    let cs = Output::new(peripherals.GPIO35, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).expect("Failed to create SPI device");

    // 3. Data/command pin and SPI batching buffer
    let dc = Output::new(peripherals.GPIO34, Level::Low, OutputConfig::default());
    let mut spi_buffer = [0u8; 512];
    let di = SpiInterface::new(spi_device, dc, &mut spi_buffer);

    // 4. Build and initialize the panel
    let panel = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        .init(&mut embassy_time::Delay)
        .expect("Failed to initialize display");

    info!("Display initialized");

    let mut config = Config::default();
    config.display.kind = DisplayKind::Color;
    config.entities.indoor_temperature = Some("sensor.indoor");
    config.animation.mode = Mode::SimpleTransition;
    config.animation.show_temperature = true;
    config.animation.fetch_interval_ms = DEMO_FETCH_INTERVAL_MS;

    let canvas = Size::new(config.display.width, config.display.height);
    let mut display = ColorDisplay::new(panel, canvas)
        .with_colors(Rgb565::new(31, 50, 8), Rgb565::BLACK);
    if let Err(e) = display.clear_panel() {
        error!("Failed to clear panel: {:?}", e);
    }
    info!(
        "Canvas {}x{} at scale {}",
        canvas.width,
        canvas.height,
        display.scale()
    );

    let mut anim =
        WeatherAnimations::new(config, demo_source(), BmpDecoder).with_display(display);
    anim.begin(Instant::now())
        .expect("Failed to allocate display buffers");

    loop {
        anim.update(Instant::now());
        Timer::after(FRAME_INTERVAL).await;
    }
}
