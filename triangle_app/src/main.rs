//! Triangle demo
//!
//! Opens a window and renders a single triangle through the graphic driver,
//! forwarding framebuffer size changes to it. Pass a `.toml` or `.ron` file
//! as the first argument to override the driver configuration.

use glfw::{Action, Key, WindowEvent};
use graphic_driver::prelude::*;
use graphic_driver::window::WindowError;
use thiserror::Error;

const WINDOW_WIDTH: u32 = 1024;
const WINDOW_HEIGHT: u32 = 768;

#[derive(Error, Debug)]
enum AppError {
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Configuration error: {0}")]
    Config(#[from] graphic_driver::ConfigError),
}

// the driver drops before the window it presents to
struct TriangleApp {
    driver: VulkanGraphicDriver,
    window: Window,
    framebuffer_size: (u32, u32),
}

impl TriangleApp {
    fn new(config: DriverConfig) -> Result<Self, AppError> {
        let window = Window::new(&config.application_name, WINDOW_WIDTH, WINDOW_HEIGHT)?;
        let framebuffer_size = window.framebuffer_size();

        Ok(Self {
            driver: VulkanGraphicDriver::new(config),
            window,
            framebuffer_size,
        })
    }

    fn run(&mut self) -> Result<(), AppError> {
        self.driver.initial()?;
        let (width, height) = self.framebuffer_size;
        self.driver
            .start_up(GraphicInitialInfo::new(&mut self.window, width, height))?;

        while !self.window.should_close() {
            let events = self.window.pump_events(self.driver.is_suspended());
            self.handle_events(events)?;

            match self.driver.draw_frame() {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    log::debug!("{}; rebuilding at the current size", err);
                    let size = self.window.framebuffer_size();
                    self.resize(size)?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.driver.shut_down()?;
        self.driver.clean_up();
        Ok(())
    }

    fn handle_events(&mut self, events: Vec<WindowEvent>) -> Result<(), AppError> {
        for event in events {
            match event {
                WindowEvent::FramebufferSize(width, height) => {
                    self.resize((width.max(0) as u32, height.max(0) as u32))?;
                }
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    self.window.request_close();
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resize(&mut self, size: (u32, u32)) -> Result<(), AppError> {
        let info = GraphicResizeInfo::new(self.framebuffer_size, size);
        self.framebuffer_size = size;
        self.driver.resize_window(&info)?;
        Ok(())
    }
}

fn load_config() -> Result<DriverConfig, AppError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading driver configuration from {}", path);
            Ok(DriverConfig::load_from_file(path)?)
        }
        None => Ok(DriverConfig::new("Triangle")),
    }
}

fn main() {
    env_logger::init();

    let result = load_config().and_then(|config| TriangleApp::new(config)?.run());
    if let Err(err) = result {
        log::error!("Triangle demo failed: {}", err);
        std::process::exit(1);
    }
}
