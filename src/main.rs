mod attachment;
mod command_bar;
mod composer;
mod config;
mod dispatch;
mod gemini;
mod highlight;
mod hotkey;
mod layout;
mod logging;
mod markdown;
mod prompt;
mod reveal;
mod segment;
mod transcript;
mod view;

use iced::{
    widget::{mouse_area, scrollable, text_input, text_input::Id, Column},
    Element, Length, Task, Theme, Font, Point, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    window::{self, Level},
};
use std::path::PathBuf;
use std::time::Duration;

use attachment::AttachmentSource;
use command_bar::{CommandBar, Submission};
use dispatch::{DispatchError, Dispatcher, Generation};
use gemini::{GeminiClient, GeminiSession};
use layout::WindowLayout;
use transcript::{CopyTicket, EntryId};

fn main() -> anyhow::Result<()> {
    logging::init();

    let config = config::Config::load();
    let api_key = config.api_key()?;

    let hotkey = match hotkey::register(&config.hotkey.combo) {
        Ok(registration) => {
            tracing::debug!("Listening for hotkey id {}", registration.id());
            Some(registration)
        }
        Err(e) => {
            tracing::warn!("{}. The window will stay open instead.", e);
            None
        }
    };
    let hotkey_active = hotkey.is_some();

    let size = WindowLayout::new(config.window.clone()).size();

    iced::application("Command Bar", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size,
            position: window::Position::Centered,
            visible: !hotkey_active,
            decorations: false,
            resizable: false,
            level: Level::AlwaysOnTop,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config, api_key, hotkey_active))
        .map_err(|e| anyhow::anyhow!("Window error: {}", e))?;

    drop(hotkey);
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    InputChanged(String),
    Submit,
    ReplyReceived {
        generation: Generation,
        result: Result<String, DispatchError>,
    },
    RevealTick,
    LoadingTick,
    CopyCode(EntryId),
    CopyAckExpired(EntryId, CopyTicket),
    ScrollToEnd,
    FileDropped(PathBuf),
    PasteRequested,
    RemoveAttachment,
    Cancel,
    Activate,
    Hide,
    DragWindow,
    HomeFound(Option<Point>),
}

struct App {
    config: config::Config,
    client: GeminiClient,
    bar: CommandBar<GeminiSession>,
    hotkey_active: bool,
    layout: WindowLayout,
    loading_frame: usize,
    input_id: Id,
    scroll_id: scrollable::Id,
}

impl App {
    fn new(config: config::Config, api_key: String, hotkey_active: bool) -> (Self, Task<Message>) {
        let client = GeminiClient::with_config(&config.gemini, api_key);
        let dispatcher = Dispatcher::new(client.start_chat(Vec::new()), config.gemini.request_timeout());
        let bar = CommandBar::new(dispatcher, config.reveal.code_placement);

        if hotkey_active {
            tracing::info!(
                "Running in the background with {}. Press {} to open.",
                client.get_model(),
                config.hotkey.combo
            );
        }

        let input_id = Id::unique();
        let app = App {
            layout: WindowLayout::new(config.window.clone()),
            config,
            client,
            bar,
            hotkey_active,
            loading_frame: 0,
            input_id: input_id.clone(),
            scroll_id: scrollable::Id::unique(),
        };

        let tasks = Task::batch([text_input::focus(input_id), find_home()]);
        (app, tasks)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.bar.set_input(value);
                Task::none()
            }
            Message::Submit => match self.bar.submit() {
                Submission::Quit => iced::exit(),
                Submission::Ignored => self.transcript_changed(),
                Submission::Sent { generation, future } => {
                    self.loading_frame = 0;
                    let request = Task::perform(future, move |result| Message::ReplyReceived {
                        generation,
                        result,
                    });
                    Task::batch([request, self.transcript_changed()])
                }
            },
            Message::ReplyReceived { generation, result } => {
                if self.bar.on_reply(generation, result) {
                    Task::batch([self.transcript_changed(), self.focus_input()])
                } else {
                    Task::none()
                }
            }
            Message::RevealTick => {
                if self.bar.tick() {
                    self.scroll_later()
                } else {
                    Task::none()
                }
            }
            Message::LoadingTick => {
                if self.bar.is_awaiting_reply() {
                    self.loading_frame = self.loading_frame.wrapping_add(1);
                }
                Task::none()
            }
            Message::CopyCode(id) => match self.bar.copy_code(id) {
                Some((source, ticket)) => {
                    let ack = self.config.reveal.copy_ack();
                    Task::batch([
                        clipboard::write(source),
                        Task::perform(tokio::time::sleep(ack), move |_| Message::CopyAckExpired(id, ticket)),
                    ])
                }
                None => Task::none(),
            },
            Message::CopyAckExpired(id, ticket) => {
                self.bar.clear_copy_ack(id, ticket);
                Task::none()
            }
            Message::ScrollToEnd => {
                scrollable::snap_to(self.scroll_id.clone(), scrollable::RelativeOffset::END)
            }
            Message::FileDropped(path) => {
                tracing::debug!("File dropped: {}", path.display());
                self.bar.attach(AttachmentSource::Path(path));
                Task::batch([self.transcript_changed(), self.focus_input()])
            }
            Message::PasteRequested => {
                if self.bar.paste_image() {
                    tracing::debug!("Pasted clipboard image");
                }
                Task::batch([self.transcript_changed(), self.focus_input()])
            }
            Message::RemoveAttachment => {
                self.bar.remove_attachment();
                Task::batch([self.fit_window(), self.focus_input()])
            }
            Message::Cancel => {
                self.bar.cancel();
                Task::none()
            }
            Message::Activate => {
                self.bar.reset(self.client.start_chat(Vec::new()));
                self.loading_frame = 0;

                let size = self.layout.collapse();
                let home = self.layout.home();
                let show = window::get_latest().and_then(move |id| {
                    let recenter = match home {
                        Some(position) => window::move_to(id, position),
                        None => Task::none(),
                    };
                    Task::batch([
                        window::change_mode(id, window::Mode::Windowed),
                        window::resize(id, size),
                        recenter,
                        window::gain_focus(id),
                    ])
                });
                let locate = if home.is_none() { find_home() } else { Task::none() };
                Task::batch([show, locate, self.focus_input()])
            }
            Message::Hide => {
                if self.hotkey_active {
                    window::get_latest().and_then(|id| window::change_mode(id, window::Mode::Hidden))
                } else {
                    iced::exit()
                }
            }
            Message::DragWindow => window::get_latest().and_then(window::drag),
            Message::HomeFound(position) => {
                if let Some(position) = position {
                    self.layout.remember_home(position);
                }
                Task::none()
            }
        }
    }

    fn focus_input(&self) -> Task<Message> {
        text_input::focus(self.input_id.clone())
    }

    fn scroll_later(&self) -> Task<Message> {
        Task::perform(tokio::time::sleep(self.config.reveal.scroll_delay()), |_| Message::ScrollToEnd)
    }

    fn fit_window(&mut self) -> Task<Message> {
        let has_transcript = !self.bar.transcript().is_empty();
        match self.layout.fit(has_transcript, self.bar.attachment().is_some()) {
            Some(size) => window::get_latest().and_then(move |id| window::resize(id, size)),
            None => Task::none(),
        }
    }

    // Resizes for the current content, then scrolls to the newest entry.
    fn transcript_changed(&mut self) -> Task<Message> {
        let fit = self.fit_window();
        if self.bar.transcript().is_empty() {
            return fit;
        }
        Task::batch([fit, self.scroll_later()])
    }

    fn subscription(&self) -> Subscription<Message> {
        let loading = if self.bar.is_awaiting_reply() {
            time::every(Duration::from_millis(80)).map(|_| Message::LoadingTick)
        } else {
            Subscription::none()
        };

        let reveal = if self.bar.is_revealing() {
            time::every(self.config.reveal.interval()).map(|_| Message::RevealTick)
        } else {
            Subscription::none()
        };

        let hotkey = if self.hotkey_active {
            Subscription::run(hotkey::activations).map(|_| Message::Activate)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| match event {
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) => Some(Message::Hide),
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Character(c),
                modifiers,
                ..
            }) if modifiers.command() && c.as_str().eq_ignore_ascii_case("v") => {
                Some(Message::PasteRequested)
            }
            IcedEvent::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        Subscription::batch([loading, reveal, hotkey, events])
    }

    fn view(&self) -> Element<Message> {
        let placeholder = if self.bar.attachment().is_some() {
            "Add a comment about the file..."
        } else {
            "Ask a question..."
        };

        let input = text_input(placeholder, self.bar.input())
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(15)
            .id(self.input_id.clone());

        let mut content = Column::new().spacing(10);

        if !self.bar.transcript().is_empty() {
            content = content.push(
                scrollable(view::transcript(self.bar.transcript()))
                    .id(self.scroll_id.clone())
                    .height(Length::Fill),
            );
        }

        if self.bar.is_awaiting_reply() {
            content = content.push(view::loading(self.loading_frame));
        }

        content = content.push(view::input_panel(input.into(), self.bar.attachment()));

        mouse_area(view::shell(content.into()))
            .on_press(Message::DragWindow)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

/// Asks for the window's current position, which becomes its home.
fn find_home() -> Task<Message> {
    window::get_latest()
        .and_then(window::get_position)
        .map(Message::HomeFound)
}
