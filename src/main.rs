use std::{
    env,
    error::Error,
    fs,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{Local, NaiveDate};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::{Alignment, Constraint, CrosstermBackend, Direction, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::Line,
    widgets::{
        BarChart, Block, BorderType, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap,
    },
    Terminal,
};
use tracing_subscriber::EnvFilter;

use crate::analytics::{completion_breakdown, completion_rate, habit_staleness};
use crate::database::{default_db_path, Store};
use crate::model::{Frequency, Habit, Task};
use crate::services::NlpClient;

mod analytics;
mod database;
mod model;
mod services;

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

const MENU: [&str; 4] = ["Tasks", "Habits", "Analytics", "NLP Tools"];
const NLP_TOOLS: [&str; 3] = ["Text Summarization", "Sentiment Analysis", "Fetch News"];

#[derive(Parser)]
#[command(about = "Personal productivity assistant: tasks, habits, analytics and NLP tools")]
struct Args {
    /// Path to the sqlite database file.
    #[arg(long, env = "PRODUCTIVITY_DB")]
    database: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone)]
enum InputField {
    TaskTitle,
    TaskDescription,
    TaskDueDate,
    TaskSearch,
    HabitName,
    SummaryText,
    SentimentText,
    NewsTopic,
}

impl InputField {
    fn label(&self) -> &'static str {
        match self {
            InputField::TaskTitle => "Task title",
            InputField::TaskDescription => "Task description",
            InputField::TaskDueDate => "Due date (YYYY-MM-DD)",
            InputField::TaskSearch => "Find task by title",
            InputField::HabitName => "Habit name",
            InputField::SummaryText => "Text to summarize",
            InputField::SentimentText => "Text to analyze",
            InputField::NewsTopic => "News topic",
        }
    }

    /// Screen to fall back to when the input is cancelled.
    fn owner(&self) -> Screen {
        match self {
            InputField::TaskTitle | InputField::TaskDescription | InputField::TaskDueDate => {
                Screen::CreateTask
            }
            InputField::TaskSearch => Screen::Tasks,
            InputField::HabitName => Screen::CreateHabit,
            InputField::SummaryText | InputField::SentimentText | InputField::NewsTopic => {
                Screen::NlpMenu
            }
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Screen {
    Menu,
    Tasks,
    CreateTask,
    Habits,
    CreateHabit,
    Analytics,
    NlpMenu,
    NlpResult,
    Input(InputField),
}

struct Message {
    text: String,
    error: bool,
}

struct State {
    screen: Screen,
    input: String,
    task_title: String,
    task_description: String,
    task_due_date: String,
    habit_name: String,
    habit_frequency: Frequency,
    nlp_result: String,
    menu_state: ListState,
    task_state: ListState,
    habit_state: ListState,
    nlp_state: ListState,
    message: Option<Message>,
}

impl State {
    fn new() -> State {
        let mut menu_state = ListState::default();
        menu_state.select(Some(0));
        State {
            screen: Screen::Menu,
            input: String::new(),
            task_title: String::new(),
            task_description: String::new(),
            task_due_date: String::new(),
            habit_name: String::new(),
            habit_frequency: Frequency::Daily,
            nlp_result: String::new(),
            menu_state,
            task_state: ListState::default(),
            habit_state: ListState::default(),
            nlp_state: ListState::default(),
            message: None,
        }
    }

    fn inform(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            error: false,
        });
    }

    fn fail(&mut self, err: impl std::fmt::Display) {
        self.message = Some(Message {
            text: err.to_string(),
            error: true,
        });
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = match args.database.or_else(default_db_path) {
        Some(path) => path,
        None => {
            eprintln!("Error: no database path; pass --database or set PRODUCTIVITY_DB.");
            std::process::exit(2);
        }
    };
    init_logging(&db_path);

    let store = match Store::open(&db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Error: could not open {}: {}", db_path.display(), err);
            std::process::exit(2);
        }
    };
    let nlp = NlpClient::new(env::var("HF_API_TOKEN").ok())?;

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &store, &nlp, State::new());
    restore_terminal(&mut terminal)?;
    result
}

/// The terminal owns stdout, so log lines go to a file beside the database.
/// Filtered through RUST_LOG, info by default.
fn init_logging(db_path: &Path) {
    let log_path = db_path.with_extension("log");
    let file = match fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        Ok(file) => file,
        Err(_) => return,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, Box<dyn Error>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(terminal.show_cursor()?)
}

fn get_tasks(store: &Store, state: &mut State) -> Vec<Task> {
    match store.list_tasks() {
        Ok(tasks) => tasks,
        Err(err) => {
            state.fail(err);
            vec![]
        }
    }
}

fn get_habits(store: &Store, state: &mut State) -> Vec<Habit> {
    match store.list_habits() {
        Ok(habits) => habits,
        Err(err) => {
            state.fail(err);
            vec![]
        }
    }
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    store: &Store,
    nlp: &NlpClient,
    mut state: State,
) -> Result<(), Box<dyn Error>> {
    loop {
        let mut tasks = vec![];
        let mut habits = vec![];
        match state.screen {
            Screen::Menu => draw_menu(terminal, &mut state),
            Screen::Tasks => {
                tasks = get_tasks(store, &mut state);
                clamp_selection(&mut state.task_state, tasks.len());
                draw_tasks(terminal, &tasks, &mut state);
            }
            Screen::CreateTask => draw_create_task(terminal, &state),
            Screen::Habits => {
                habits = get_habits(store, &mut state);
                clamp_selection(&mut state.habit_state, habits.len());
                draw_habits(terminal, &habits, &mut state);
            }
            Screen::CreateHabit => draw_create_habit(terminal, &state),
            Screen::Analytics => {
                tasks = get_tasks(store, &mut state);
                habits = get_habits(store, &mut state);
                draw_analytics(terminal, &tasks, &habits, &state);
            }
            Screen::NlpMenu => draw_nlp_menu(terminal, &mut state),
            Screen::NlpResult => draw_nlp_result(terminal, &state),
            Screen::Input(field) => draw_input(terminal, &state, field),
        }

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match state.screen {
            Screen::Menu => match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('j') | KeyCode::Down => move_down(&mut state.menu_state, MENU.len()),
                KeyCode::Char('k') | KeyCode::Up => move_up(&mut state.menu_state),
                KeyCode::Enter | KeyCode::Char('l') => {
                    state.message = None;
                    state.screen = match state.menu_state.selected() {
                        Some(1) => Screen::Habits,
                        Some(2) => Screen::Analytics,
                        Some(3) => Screen::NlpMenu,
                        _ => Screen::Tasks,
                    };
                }
                _ => {}
            },

            Screen::Tasks => match key.code {
                KeyCode::Char('q') | KeyCode::Char('h') => state.screen = Screen::Menu,
                KeyCode::Char('j') | KeyCode::Down => move_down(&mut state.task_state, tasks.len()),
                KeyCode::Char('k') | KeyCode::Up => move_up(&mut state.task_state),
                KeyCode::Char('N') => {
                    state.task_title.clear();
                    state.task_description.clear();
                    state.task_due_date = Local::now()
                        .date_naive()
                        .format(DATE_INPUT_FORMAT)
                        .to_string();
                    state.screen = Screen::CreateTask;
                }
                KeyCode::Char(' ') | KeyCode::Char('l') => toggle_task(store, &mut state, &tasks),
                KeyCode::Char('D') => delete_task(store, &mut state, &tasks),
                KeyCode::Char('/') => state.screen = Screen::Input(InputField::TaskSearch),
                _ => {}
            },

            Screen::CreateTask => match key.code {
                KeyCode::Char('q') => state.screen = Screen::Tasks,
                KeyCode::Char('t') => state.screen = Screen::Input(InputField::TaskTitle),
                KeyCode::Char('d') => state.screen = Screen::Input(InputField::TaskDescription),
                KeyCode::Char('e') => state.screen = Screen::Input(InputField::TaskDueDate),
                KeyCode::Char('s') => save_task(store, &mut state),
                _ => {}
            },

            Screen::Habits => match key.code {
                KeyCode::Char('q') | KeyCode::Char('h') => state.screen = Screen::Menu,
                KeyCode::Char('j') | KeyCode::Down => {
                    move_down(&mut state.habit_state, habits.len())
                }
                KeyCode::Char('k') | KeyCode::Up => move_up(&mut state.habit_state),
                KeyCode::Char('N') => {
                    state.habit_name.clear();
                    state.habit_frequency = Frequency::Daily;
                    state.screen = Screen::CreateHabit;
                }
                KeyCode::Char(' ') | KeyCode::Char('l') => log_habit(store, &mut state, &habits),
                _ => {}
            },

            Screen::CreateHabit => match key.code {
                KeyCode::Char('q') => state.screen = Screen::Habits,
                KeyCode::Char('n') => state.screen = Screen::Input(InputField::HabitName),
                KeyCode::Char('f') => state.habit_frequency = state.habit_frequency.next(),
                KeyCode::Char('s') => save_habit(store, &mut state),
                _ => {}
            },

            Screen::Analytics => match key.code {
                KeyCode::Char('q') | KeyCode::Char('h') => state.screen = Screen::Menu,
                _ => {}
            },

            Screen::NlpMenu => match key.code {
                KeyCode::Char('q') | KeyCode::Char('h') => state.screen = Screen::Menu,
                KeyCode::Char('j') | KeyCode::Down => {
                    move_down(&mut state.nlp_state, NLP_TOOLS.len())
                }
                KeyCode::Char('k') | KeyCode::Up => move_up(&mut state.nlp_state),
                KeyCode::Enter | KeyCode::Char('l') => {
                    state.screen = Screen::Input(match state.nlp_state.selected() {
                        Some(1) => InputField::SentimentText,
                        Some(2) => InputField::NewsTopic,
                        _ => InputField::SummaryText,
                    });
                }
                _ => {}
            },

            Screen::NlpResult => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => state.screen = Screen::NlpMenu,
                _ => {}
            },

            Screen::Input(field) => match key.code {
                KeyCode::Char(c) => state.input.push(c),
                KeyCode::Backspace => {
                    state.input.pop();
                }
                KeyCode::Esc => {
                    state.input.clear();
                    state.screen = field.owner();
                }
                KeyCode::Enter => commit_input(store, nlp, &mut state, field),
                _ => {}
            },
        }
    }
    Ok(())
}

fn clamp_selection(list_state: &mut ListState, len: usize) {
    match list_state.selected() {
        Some(_) if len == 0 => list_state.select(None),
        Some(i) if i >= len => list_state.select(Some(len - 1)),
        None if len > 0 => list_state.select(Some(0)),
        _ => {}
    }
}

fn move_up(list_state: &mut ListState) {
    match list_state.selected() {
        Some(0) | None => list_state.select(Some(0)),
        Some(i) => list_state.select(Some(i - 1)),
    }
}

fn move_down(list_state: &mut ListState, len: usize) {
    if len == 0 {
        return;
    }
    match list_state.selected() {
        Some(i) => list_state.select(Some((i + 1).min(len - 1))),
        None => list_state.select(Some(0)),
    }
}

fn toggle_task(store: &Store, state: &mut State, tasks: &[Task]) {
    let Some(task) = state.task_state.selected().and_then(|i| tasks.get(i)) else {
        return;
    };
    match store.update_task_status(task.id, !task.completed) {
        Ok(()) => state.inform(format!("Task '{}' updated.", task.title)),
        Err(err) => state.fail(err),
    }
}

fn delete_task(store: &Store, state: &mut State, tasks: &[Task]) {
    let Some(task) = state.task_state.selected().and_then(|i| tasks.get(i)) else {
        return;
    };
    match store.delete_task(task.id) {
        Ok(()) => state.inform(format!("Task '{}' deleted.", task.title)),
        Err(err) => state.fail(err),
    }
}

/// Malformed dates are rejected here, before the store sees anything.
fn save_task(store: &Store, state: &mut State) {
    let due = NaiveDate::parse_from_str(state.task_due_date.trim(), DATE_INPUT_FORMAT)
        .map(|date| date.and_hms_opt(0, 0, 0));
    let due = match due {
        Ok(Some(due)) => due,
        _ => {
            state.fail(format!(
                "Invalid due date '{}', expected YYYY-MM-DD.",
                state.task_due_date
            ));
            return;
        }
    };
    match store.add_task(&state.task_title, &state.task_description, due) {
        Ok(task) => {
            state.inform(format!("Task '{}' added.", task.title));
            state.screen = Screen::Tasks;
        }
        Err(err) => state.fail(err),
    }
}

fn save_habit(store: &Store, state: &mut State) {
    match store.add_habit(&state.habit_name, state.habit_frequency) {
        Ok(habit) => {
            state.inform(format!("Habit '{}' added.", habit.name));
            state.screen = Screen::Habits;
        }
        Err(err) => state.fail(err),
    }
}

fn log_habit(store: &Store, state: &mut State, habits: &[Habit]) {
    let Some(habit) = state.habit_state.selected().and_then(|i| habits.get(i)) else {
        return;
    };
    match store.log_habit(habit.id) {
        Ok(stamped) => state.inform(format!(
            "Habit '{}' logged at {}.",
            habit.name,
            stamped.format("%Y-%m-%d %H:%M:%S")
        )),
        Err(err) => state.fail(err),
    }
}

/// Jump the selection to the first task whose title matches. Titles are not
/// unique, so this inherits the store's first-in-rowid-order tie-break.
fn search_task(store: &Store, state: &mut State, title: &str) {
    match store.find_task_by_title(title) {
        Ok(Some(task)) => {
            if let Ok(tasks) = store.list_tasks() {
                if let Some(pos) = tasks.iter().position(|t| t.id == task.id) {
                    state.task_state.select(Some(pos));
                }
            }
            state.inform(format!("Found task '{}'.", task.title));
        }
        Ok(None) => state.fail(format!("No task titled '{title}'.")),
        Err(err) => state.fail(err),
    }
}

fn commit_input(store: &Store, nlp: &NlpClient, state: &mut State, field: InputField) {
    let value = std::mem::take(&mut state.input);
    match field {
        InputField::TaskTitle => {
            state.task_title = value;
            state.screen = Screen::CreateTask;
        }
        InputField::TaskDescription => {
            state.task_description = value;
            state.screen = Screen::CreateTask;
        }
        InputField::TaskDueDate => {
            state.task_due_date = value;
            state.screen = Screen::CreateTask;
        }
        InputField::TaskSearch => {
            search_task(store, state, value.trim());
            state.screen = Screen::Tasks;
        }
        InputField::HabitName => {
            state.habit_name = value;
            state.screen = Screen::CreateHabit;
        }
        // The service calls below block until the client timeout at worst.
        InputField::SummaryText => match nlp.summarize(&value) {
            Ok(summary) => {
                state.nlp_result = summary;
                state.screen = Screen::NlpResult;
            }
            Err(err) => {
                state.fail(err);
                state.screen = Screen::NlpMenu;
            }
        },
        InputField::SentimentText => match nlp.sentiment(&value) {
            Ok(sentiment) => {
                state.nlp_result = format!(
                    "Sentiment: {} (score {:.2})",
                    sentiment.label, sentiment.score
                );
                state.screen = Screen::NlpResult;
            }
            Err(err) => {
                state.fail(err);
                state.screen = Screen::NlpMenu;
            }
        },
        InputField::NewsTopic => match nlp.fetch_news(&value) {
            Ok(items) if items.is_empty() => {
                state.inform(format!("No articles found for '{value}'."));
                state.screen = Screen::NlpMenu;
            }
            Ok(items) => {
                state.nlp_result = items
                    .iter()
                    .map(|item| {
                        if item.link.is_empty() {
                            format!("- {}", item.title)
                        } else {
                            format!("- {}\n  {}", item.title, item.link)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                state.screen = Screen::NlpResult;
            }
            Err(err) => {
                state.fail(err);
                state.screen = Screen::NlpMenu;
            }
        },
    }
}

fn status_line(state: &State) -> Paragraph<'static> {
    match &state.message {
        Some(message) => Paragraph::new(message.text.clone()).style(if message.error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        }),
        None => Paragraph::new(""),
    }
}

fn draw_menu(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &mut State) {
    let items: Vec<_> = MENU.iter().map(|entry| ListItem::new(*entry)).collect();
    let menu_ui = List::new(items)
        .block(Block::default().title("Menu").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Length(1),
                        Constraint::Min(6),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_widget(
                Paragraph::new("Personal Productivity Assistant").alignment(Alignment::Center),
                chunks[0],
            );
            frame.render_stateful_widget(menu_ui, chunks[1], &mut state.menu_state);
            frame.render_widget(
                Paragraph::new("(j/k) move  (enter) open  (q) quit"),
                chunks[2],
            );
            frame.render_widget(status, chunks[3]);
        })
        .ok();
}

fn draw_tasks(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    tasks: &[Task],
    state: &mut State,
) {
    let items: Vec<_> = tasks
        .iter()
        .map(|task| {
            ListItem::new(format!(
                "{} {} - due {}",
                match task.completed {
                    true => "[x]",
                    false => "[ ]",
                },
                task.title,
                task.due_date.format(DATE_INPUT_FORMAT),
            ))
        })
        .collect();
    let tasks_ui = List::new(items)
        .block(Block::default().title("Tasks").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");

    let detail = state
        .task_state
        .selected()
        .and_then(|i| tasks.get(i))
        .map(|task| {
            format!(
                "{}\n\nDue: {}\nCompleted: {}\n\n{}",
                task.title,
                task.due_date.format(DATE_INPUT_FORMAT),
                match task.completed {
                    true => "Yes",
                    false => "No",
                },
                task.description,
            )
        })
        .unwrap_or_default();
    let detail_ui = Paragraph::new(detail)
        .block(Block::default().title("Details").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Min(5),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Min(2)].as_ref())
                .split(chunks[0]);

            frame.render_stateful_widget(tasks_ui, columns[0], &mut state.task_state);
            frame.render_widget(detail_ui, columns[1]);
            frame.render_widget(
                Paragraph::new("(N) new  (space) toggle done  (D) delete  (/) find  (j/k) move  (q) back"),
                chunks[1],
            );
            frame.render_widget(status, chunks[2]);
        })
        .ok();
}

fn draw_create_task(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &State) {
    let text = vec![
        Line::from("(t) Input title"),
        Line::from("(d) Input description"),
        Line::from("(e) Input due date"),
        Line::from("(s) Save task".green().italic()),
        Line::from("(q) Cancel".red()),
    ];
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Length(2),
                        Constraint::Min(5),
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_widget(
                Paragraph::new("New task").alignment(Alignment::Center),
                chunks[0],
            );
            frame.render_widget(
                Paragraph::new(text.clone()).alignment(Alignment::Center),
                chunks[1],
            );
            frame.render_widget(field_box(&state.task_title, "Title"), chunks[2]);
            frame.render_widget(field_box(&state.task_description, "Description"), chunks[3]);
            frame.render_widget(field_box(&state.task_due_date, "Due date"), chunks[4]);
            frame.render_widget(status, chunks[5]);
        })
        .ok();
}

fn draw_habits(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    habits: &[Habit],
    state: &mut State,
) {
    let items: Vec<_> = habits
        .iter()
        .map(|habit| {
            ListItem::new(format!(
                "{} ({}) - last logged {}",
                habit.name,
                habit.frequency,
                habit.last_logged.format("%Y-%m-%d %H:%M:%S"),
            ))
        })
        .collect();
    let habits_ui = List::new(items)
        .block(Block::default().title("Habits").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Min(5),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_stateful_widget(habits_ui, chunks[0], &mut state.habit_state);
            frame.render_widget(
                Paragraph::new("(N) new  (space) log now  (j/k) move  (q) back"),
                chunks[1],
            );
            frame.render_widget(status, chunks[2]);
        })
        .ok();
}

fn draw_create_habit(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &State) {
    let text = vec![
        Line::from("(n) Input name"),
        Line::from("(f) Cycle frequency"),
        Line::from("(s) Save habit".green().italic()),
        Line::from("(q) Cancel".red()),
    ];
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Length(2),
                        Constraint::Min(5),
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_widget(
                Paragraph::new("New habit").alignment(Alignment::Center),
                chunks[0],
            );
            frame.render_widget(
                Paragraph::new(text.clone()).alignment(Alignment::Center),
                chunks[1],
            );
            frame.render_widget(field_box(&state.habit_name, "Name"), chunks[2]);
            frame.render_widget(
                field_box(state.habit_frequency.as_str(), "Frequency"),
                chunks[3],
            );
            frame.render_widget(status, chunks[4]);
        })
        .ok();
}

fn draw_analytics(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    tasks: &[Task],
    habits: &[Habit],
    state: &State,
) {
    let rate = completion_rate(tasks);
    let breakdown = completion_breakdown(tasks);
    let staleness = habit_staleness(habits, Local::now().naive_local());

    let rate_ui = rate.map(|rate| {
        Gauge::default()
            .block(
                Block::default()
                    .title("Task completion rate")
                    .borders(Borders::ALL),
            )
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(rate / 100.0)
            .label(format!(
                "{rate:.2}% ({} done, {} open)",
                breakdown.completed, breakdown.incomplete
            ))
    });

    let bars: Vec<(&str, u64)> = staleness
        .iter()
        .map(|entry| (entry.name.as_str(), entry.days as u64))
        .collect();
    let staleness_ui = if bars.is_empty() {
        None
    } else {
        Some(
            BarChart::default()
                .block(
                    Block::default()
                        .title("Days since each habit was last logged")
                        .borders(Borders::ALL),
                )
                .bar_width(9)
                .bar_gap(2)
                .data(&bars),
        )
    };
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Min(8),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            match rate_ui {
                Some(gauge) => frame.render_widget(gauge, chunks[0]),
                None => frame.render_widget(
                    Paragraph::new("No tasks to analyze.").block(
                        Block::default()
                            .title("Task completion rate")
                            .borders(Borders::ALL),
                    ),
                    chunks[0],
                ),
            }
            match staleness_ui {
                Some(chart) => frame.render_widget(chart, chunks[1]),
                None => frame.render_widget(
                    Paragraph::new("No habits to analyze.").block(
                        Block::default()
                            .title("Days since each habit was last logged")
                            .borders(Borders::ALL),
                    ),
                    chunks[1],
                ),
            }
            frame.render_widget(Paragraph::new("(q) back"), chunks[2]);
            frame.render_widget(status, chunks[3]);
        })
        .ok();
}

fn draw_nlp_menu(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &mut State) {
    let items: Vec<_> = NLP_TOOLS.iter().map(|tool| ListItem::new(*tool)).collect();
    let tools_ui = List::new(items)
        .block(Block::default().title("NLP Tools").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().add_modifier(Modifier::ITALIC))
        .highlight_symbol(">>");
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Min(5),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_stateful_widget(tools_ui, chunks[0], &mut state.nlp_state);
            frame.render_widget(
                Paragraph::new("(j/k) move  (enter) run  (q) back"),
                chunks[1],
            );
            frame.render_widget(status, chunks[2]);
        })
        .ok();
}

fn draw_nlp_result(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &State) {
    let result_ui = Paragraph::new(state.nlp_result.clone())
        .block(Block::default().title("Result").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    let status = status_line(state);

    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Min(5),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_widget(result_ui, chunks[0]);
            frame.render_widget(Paragraph::new("(q) back"), chunks[1]);
            frame.render_widget(status, chunks[2]);
        })
        .ok();
}

fn draw_input(terminal: &mut Terminal<CrosstermBackend<Stdout>>, state: &State, field: InputField) {
    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(2)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Length(4),
                        Constraint::Length(1),
                        Constraint::Min(0),
                    ]
                    .as_ref(),
                )
                .split(frame.area());

            frame.render_widget(
                Paragraph::new(field.label()).alignment(Alignment::Center),
                chunks[0],
            );
            frame.render_widget(
                Paragraph::new(state.input.clone())
                    .block(
                        Block::default()
                            .title(field.label())
                            .borders(Borders::ALL)
                            .border_type(BorderType::Rounded),
                    )
                    .alignment(Alignment::Center),
                chunks[1],
            );
            frame.render_widget(
                Paragraph::new("(enter) confirm  (esc) cancel").alignment(Alignment::Center),
                chunks[2],
            );
        })
        .ok();
}

fn field_box<'a>(value: &'a str, title: &'a str) -> Paragraph<'a> {
    Paragraph::new(value)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        )
        .alignment(Alignment::Center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn due(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn save_task_rejects_malformed_date_before_the_store() {
        let store = Store::open_in_memory().unwrap();
        let mut state = State::new();
        state.task_title = "Report".to_string();
        state.task_due_date = "09/01/2026".to_string();

        save_task(&store, &mut state);

        assert!(store.list_tasks().unwrap().is_empty());
        let message = state.message.as_ref().unwrap();
        assert!(message.error);
        assert!(message.text.contains("09/01/2026"));
    }

    #[test]
    fn save_task_persists_valid_date_at_midnight() {
        let store = Store::open_in_memory().unwrap();
        let mut state = State::new();
        state.task_title = "Report".to_string();
        state.task_description = "Quarterly numbers".to_string();
        state.task_due_date = "2026-09-01".to_string();

        save_task(&store, &mut state);

        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Report");
        assert_eq!(tasks[0].due_date, due(2026, 9, 1));
        assert!(!state.message.as_ref().unwrap().error);
        assert!(matches!(state.screen, Screen::Tasks));
    }

    #[test]
    fn search_task_selects_first_match_and_reports_misses() {
        let store = Store::open_in_memory().unwrap();
        store.add_task("other", "", due(2026, 1, 1)).unwrap();
        store.add_task("wanted", "", due(2026, 1, 2)).unwrap();
        let mut state = State::new();

        search_task(&store, &mut state, "wanted");
        assert_eq!(state.task_state.selected(), Some(1));
        assert!(!state.message.as_ref().unwrap().error);

        search_task(&store, &mut state, "missing");
        assert!(state.message.as_ref().unwrap().error);
    }
}
