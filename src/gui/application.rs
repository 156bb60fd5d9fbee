use std::convert::Infallible;
use std::path::PathBuf;
use futures::SinkExt;
use futures::channel::mpsc::Sender;
use futures::future::pending;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::subscription;
use iced::theme::{self, Theme};
use iced::widget::{Column, button, column, container, horizontal_rule, row, scrollable, text};
use log::{info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::types::{ConnectionStatus, Permission, ScanState};
use crate::error::AppRunError;
use crate::gui::projection::{ConnectionScreen, status_reaction};
use crate::gui::style::DeviceRowStyleSheet;
use crate::gui::types::{Message, Screen};
use crate::services::Services;

pub struct ApplicationFlags {
    config: Config,
    services: Services,
    app_cancel: CancellationToken,
}

pub struct CardiacZoneApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,
    services: Services,
    screen: Screen,
    connection_screen: ConnectionScreen,

    // latest published values
    scan_state: ScanState,
    connection_status: ConnectionStatus,

    // message for the most recent status change
    notice: Option<&'static str>,
    connected_address: Option<String>,
}

impl CardiacZoneApplication {
    fn check_permissions(&self) -> Command<Message> {
        let platform = self.services.platform.clone();

        Command::perform(
            async move { platform.has_permission(Permission::Connect).await },
            Message::PermissionsChecked,
        )
    }

    fn rescan(&mut self) -> Command<Message> {
        self.connection_screen.rescan();
        let scan = self.services.scan.clone();

        Command::perform(async move { scan.scan().await }, Message::ScanComplete)
    }

    fn connect(&mut self) -> Command<Message> {
        let address = match self.connection_screen.connect() {
            Some(address) => address,
            None => return Command::none(),
        };

        info!("Handing device {} to the sensor service", address);
        self.connected_address = Some(address.clone());
        let launcher = self.services.launcher.clone();

        Command::perform(async move { launcher.start(address) }, Message::ServiceStarted)
    }

    fn navigate_next(&mut self) {
        info!("Sensor connected, showing dashboard");
        self.screen = Screen::Dashboard;
    }

    fn before_close(&mut self, id: window::Id) -> Command<Message> {
        self.app_cancel.cancel();
        let scan = self.services.scan.clone();

        Command::perform(
            async move {
                scan.stop_scan().await;
                id
            },
            Message::CloseReady,
        )
    }

    fn connection_view(&self) -> Element<Message> {
        let view = self.connection_screen.project(&self.scan_state);

        let devices = Column::with_children(
            view.rows
                .into_iter()
                .map(|device| -> Element<Message> {
                    button(
                        row![
                            text(device.label).width(Length::Fill),
                            text(device.address.clone()).size(12),
                        ]
                        .align_items(Alignment::Center)
                        .spacing(10)
                    )
                    .style(theme::Button::Custom(Box::new(DeviceRowStyleSheet { selected: device.selected })))
                    .width(Length::Fill)
                    .padding([8, 16])
                    .on_press(Message::SelectDevice(device.address))
                    .into()
                })
        )
        .spacing(4)
        .width(Length::Fill);

        let mut content = column![
            text("Connect").size(28),
            text(if view.scanning { "◌ scanning" } else { "" }).size(14),
            text(view.status_line),
            scrollable(devices).height(200),
        ]
        .align_items(Alignment::Center)
        .spacing(16)
        .width(Length::Fill);

        if view.actions_visible {
            content = content.push(
                row![
                    button(text("Rescan")).on_press(Message::Rescan),
                    button(text("Connect"))
                        .style(theme::Button::Positive)
                        .on_press_maybe(view.connect_enabled.then_some(Message::Connect)),
                ]
                .spacing(24)
            );
        }

        content.push(horizontal_rule(10))
            .push(text(self.notice.unwrap_or("")).size(14))
            .into()
    }

    fn dashboard_view(&self) -> Element<Message> {
        let address = self.connected_address.as_deref().unwrap_or("");

        let mut content = column![
            text("Cardiac Zone").size(28),
            text(format!("Sensor {}", address)),
            text(self.connection_status.description()),
        ]
        .align_items(Alignment::Center)
        .spacing(16)
        .width(Length::Fill);

        if self.connection_status != ConnectionStatus::Connected {
            content = content.push(button(text("Back to devices")).on_press(Message::Back));
        }

        content.into()
    }
}

impl Application for CardiacZoneApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (CardiacZoneApplication, Command<Self::Message>) {
        let app = CardiacZoneApplication {
            app_cancel: flags.app_cancel,
            screen: Screen::Connection,
            connection_screen: ConnectionScreen::new(flags.config.show_device_names),
            scan_state: flags.services.scan.state(),
            connection_status: flags.services.monitor.status(),
            services: flags.services,
            notice: None,
            connected_address: None,
        };

        let command = app.check_permissions();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("Cardiac Zone ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::PermissionsChecked(show_names) => {
                if !show_names {
                    info!("Not allowed to display device names");
                }
                self.connection_screen.set_show_names(show_names);
            },
            Message::ScanStateChanged(state) => {
                self.scan_state = state;
            },
            Message::ConnectionStatusChanged(status) => {
                self.connection_status = status;

                let reaction = status_reaction(status);
                self.notice = Some(reaction.message);
                if reaction.navigate_next {
                    self.navigate_next();
                }
            },
            Message::SelectDevice(address) => {
                self.connection_screen.select(address);
            },
            Message::Rescan => {
                return self.rescan();
            },
            Message::Connect => {
                return self.connect();
            },
            Message::Back => {
                self.screen = Screen::Connection;
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                return self.before_close(id);
            },
            Message::CloseReady(id) => {
                return window::close(id);
            },
            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            event::listen().map(Message::EventOccurred),
            state_subscription(self.services.scan.subscribe(), self.services.monitor.subscribe()),
        ])
    }

    fn view(&self) -> Element<Message> {
        let content = match self.screen {
            Screen::Connection => self.connection_view(),
            Screen::Dashboard => self.dashboard_view(),
        };

        container(content)
            .width(Length::Fill)
            .padding(20)
            .into()
    }
}

// Forwards every published scan state and connection status to the application.
// Both receivers replay their current value first.
async fn forward_states(
    mut scan: watch::Receiver<ScanState>,
    mut status: watch::Receiver<ConnectionStatus>,
    mut output: Sender<Message>,
) -> Infallible {
    let initial = [
        Message::ScanStateChanged(scan.borrow_and_update().clone()),
        Message::ConnectionStatusChanged(*status.borrow_and_update()),
    ];
    for message in initial {
        if let Err(err) = output.send(message).await {
            warn!("Failed to forward state to the application: {}", err);
        }
    }

    loop {
        let message = tokio::select! {
            Ok(()) = scan.changed() => {
                let state = scan.borrow_and_update().clone();
                Message::ScanStateChanged(state)
            },
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                Message::ConnectionStatusChanged(current)
            },
            else => {
                // both senders are gone; subscription::channel expects the future to never resolve
                return pending().await;
            },
        };

        if let Err(err) = output.send(message).await {
            warn!("Failed to forward state to the application: {}", err);
        }
    }
}

fn state_subscription(
    scan: watch::Receiver<ScanState>,
    status: watch::Receiver<ConnectionStatus>,
) -> Subscription<Message> {
    struct Observe;

    subscription::channel(
        std::any::TypeId::of::<Observe>(),
        64,
        move |output| forward_states(scan, status, output),
    )
}

pub fn run_application(config_path: Option<PathBuf>) -> Result<(), AppRunError> {
    let mut config_io = match config_path {
        Some(path) => ConfigIO::open(&path)?,
        None => ConfigIO::new_sync()?,
    };
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let config = tokio::runtime::Runtime::new()
        .map_err(|source| AppRunError::Runtime { source })?
        .block_on(config_io.read_or_default());

    let app_cancel = CancellationToken::new();
    let services = Services::btleplug(&config, app_cancel.clone());

    let flags = ApplicationFlags { config, services, app_cancel };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("cardiac-zone".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(420.0, 640.0);

    // this function will call process::exit() unless there was a startup error
    CardiacZoneApplication::run(settings)?;
    Ok(())
}
