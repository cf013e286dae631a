use condo_meter::client::{ReportAction, ReportClient};
use condo_meter::config::{Config, init_logging};
use condo_meter::dashboard::{
    Action, Dashboard, Level, UiEvent, load_condominiums, lock, submit,
};
use condo_meter::form::FormField;
use condo_meter::preview::PreviewSelector;
use condo_meter::reading::ReadingField;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

const HELP: &str = "Commands:
  condos                    List condominiums
  select <n|id>             Open a condominium
  back                      Return to the condominium list
  import <file.xlsx>        Import meter readings
  logo <file>|clear         Attach or drop the report logo
  table                     Show readings and form fields
  set <row> prev|curr <v>   Edit a reading
  common <row> on|off       Mark a row as common area
  field <name> <value>      Set from, to, next, tariff, fee or apportionment
  preview                   Request report previews
  show <global|individual-N> Print a preview document
  process                   Generate the final reports
  q                         Quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let config = Config::from_env();
    let client = ReportClient::new(config.api_url.clone());
    let dashboard = Mutex::new(Dashboard::new());

    println!("Type 'help' for the list of commands.");
    let mut status = String::from("ok");
    loop {
        let prompt = match lock(&dashboard).condominium() {
            Some(condo) => condo.name.clone(),
            None => "no condominium".to_string(),
        };
        print!("({}) [{}] > ", status, prompt);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        let mut parts = command.splitn(2, ' ');
        let verb = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        status = String::from("ok");
        match verb {
            "" => continue,
            "q" | "quit" => break,
            "help" => println!("{}", HELP),
            "condos" => {
                load_condominiums(&dashboard, &client).await;
                for (n, condo) in lock(&dashboard).condominiums().iter().enumerate() {
                    println!("  {:>3}. {} ({})", n + 1, condo.name, condo.id);
                }
            }
            "select" => {
                let chosen = {
                    let state = lock(&dashboard);
                    let by_position = rest
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| state.condominiums().get(i));
                    by_position.or_else(|| state.find_condominium(rest)).cloned()
                };
                match chosen {
                    Some(condo) => lock(&dashboard).dispatch(Action::CondominiumSelected(condo)),
                    None => status = String::from("unknown condominium"),
                }
            }
            "back" => lock(&dashboard).dispatch(Action::ReturnedToSelector),
            "import" => match fs::read(rest) {
                Ok(bytes) => {
                    let file_name = file_name_of(rest);
                    lock(&dashboard).dispatch(Action::FileImported { file_name, bytes });
                    print_table(&lock(&dashboard));
                }
                Err(e) => status = format!("cannot read {}: {}", rest, e),
            },
            "logo" if rest == "clear" => lock(&dashboard).dispatch(Action::LogoSelected(None)),
            "logo" => {
                let action = match fs::read(rest) {
                    Ok(bytes) => Action::LogoSelected(Some(bytes)),
                    Err(e) => Action::LogoUnreadable(e.to_string()),
                };
                lock(&dashboard).dispatch(action);
            }
            "table" => print_table(&lock(&dashboard)),
            "set" => match parse_set(rest) {
                Some((index, field, text)) => {
                    lock(&dashboard).dispatch(Action::CellEdited { index, field, text });
                    print_table(&lock(&dashboard));
                }
                None => status = String::from("usage: set <row> prev|curr <value>"),
            },
            "common" => match parse_common(rest) {
                Some((index, checked)) => {
                    lock(&dashboard).dispatch(Action::CommonAreaToggled { index, checked })
                }
                None => status = String::from("usage: common <row> on|off"),
            },
            "field" => {
                let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
                match FormField::from_name(name) {
                    Some(field) => lock(&dashboard).dispatch(Action::FieldChanged {
                        field,
                        value: value.trim().to_string(),
                    }),
                    None => status = format!("unknown field: {}", name),
                }
            }
            "preview" => {
                submit(&dashboard, &client, ReportAction::Preview).await;
                for tab in lock(&dashboard).presenter().tabs() {
                    println!("  {:<16} {}", tab.target, tab.label);
                }
            }
            "show" => {
                let state = lock(&dashboard);
                let content = rest
                    .parse::<PreviewSelector>()
                    .and_then(|selector| state.preview_content(selector));
                match content {
                    Ok(html) => println!("{}", html),
                    Err(_) => println!("Could not load the preview."),
                }
            }
            "process" => {
                submit(&dashboard, &client, ReportAction::Process).await;
                if let Some(links) = lock(&dashboard).download_links() {
                    println!("  Global report:     {}", links.global_pdf_url);
                    println!("  Individual reports: {}", links.individual_zip_url);
                }
            }
            _ => status = String::from("invalid command"),
        }

        let events = lock(&dashboard).drain_events();
        print_events(&events);
    }

    Ok(())
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

// Rows are numbered from 1 on screen
fn parse_row(text: &str) -> Option<usize> {
    text.parse::<usize>().ok()?.checked_sub(1)
}

fn parse_set(rest: &str) -> Option<(usize, ReadingField, String)> {
    let mut parts = rest.splitn(3, ' ');
    let index = parse_row(parts.next()?)?;
    let field = ReadingField::from_name(parts.next()?)?;
    let text = parts.next().unwrap_or_default().to_string();
    Some((index, field, text))
}

fn parse_common(rest: &str) -> Option<(usize, bool)> {
    let (row, flag) = rest.split_once(' ')?;
    let checked = match flag.trim() {
        "on" | "yes" | "true" => true,
        "off" | "no" | "false" => false,
        _ => return None,
    };
    Some((parse_row(row)?, checked))
}

fn print_table(dashboard: &Dashboard) {
    let view = dashboard.snapshot();
    if view.rows.is_empty() {
        println!("  Waiting for a readings file...");
    } else {
        println!(
            "  {:>4}  {:<14} {:>12} {:>12} {:>12}  {}",
            "#", "Unit", "Previous", "Current", "Consumption", "Common"
        );
        for row in &view.rows {
            println!(
                "  {:>4}  {:<14} {:>12} {:>12} {:>12}{} {}",
                row.index + 1,
                row.unit,
                row.previous_reading,
                row.current_reading,
                row.consumption,
                if row.negative { "!" } else { " " },
                if row.is_common_area { "yes" } else { "" }
            );
        }
    }
    let fields = &view.fields;
    println!(
        "  period {} .. {}  next {}  tariff {}  fee {}  apportionment {}",
        fields.period_from,
        fields.period_to,
        fields.next_reading,
        fields.energy_tariff,
        fields.management_fee,
        fields.common_area_apportionment
    );
    println!(
        "  logo: {}  ready to submit: {}",
        if view.logo_loaded { "loaded" } else { "none" },
        view.can_submit
    );
}

fn print_events(events: &[UiEvent]) {
    for event in events {
        match event {
            UiEvent::Notify(note) => {
                let tag = match note.level {
                    Level::Info => "info",
                    Level::Success => "done",
                    Level::Warning => "warn",
                    Level::Error => "error",
                };
                println!("[{}] {}", tag, note.message);
            }
            UiEvent::Progress(progress) => {
                println!("[{:>3}%] {}", progress.percent, progress.label)
            }
            UiEvent::ProgressHidden => {}
        }
    }
}
