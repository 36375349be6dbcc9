use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::engine::{InputOutcome, TypingProgress};
use crate::metrics::format_elapsed;
use crate::orchestrator::SessionSummary;
use crate::session::SessionPhase;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

/// Shown in place of a space so it stays visible in the target word
const SPACE_GLYPH: &str = "␣";

fn visible(c: char) -> String {
    match c {
        ' ' => SPACE_GLYPH.to_owned(),
        c => c.to_string(),
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);
        let underlined_dim_bold_style = Style::default()
            .patch(dim_bold_style)
            .add_modifier(Modifier::UNDERLINED);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1), // categories
                    Constraint::Length(1), // stats
                    Constraint::Min(0),
                    Constraint::Length(1), // word / countdown
                    Constraint::Length(1), // input
                    Constraint::Min(0),
                    Constraint::Length(1), // notice
                    Constraint::Length(1), // summary
                    Constraint::Length(1), // control + legend
                ]
                .as_ref(),
            )
            .split(area);

        let orchestrator = &self.orchestrator;
        let phase = orchestrator.phase();

        let categories = orchestrator
            .words()
            .categories()
            .iter()
            .map(|c| {
                if c.id == orchestrator.category() {
                    Span::styled(format!("[{}]", c.display_name()), green_bold_style)
                } else {
                    Span::styled(format!(" {} ", c.display_name()), dim_bold_style)
                }
            })
            .collect::<Vec<Span>>();
        Paragraph::new(Line::from(categories))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let board = &self.scoreboard;
        let stats = format!(
            "{}   {} correct   {} mistakes   {}% acc   {} wpm",
            format_elapsed(board.elapsed),
            board.counters.correct_keystrokes,
            board.counters.mistake_keystrokes,
            board.metrics.accuracy,
            board.metrics.wpm,
        );
        Paragraph::new(Span::styled(stats, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let max_width = chunks[3].width as usize;
        let main_line = match phase {
            SessionPhase::Idle => Line::from(Span::styled("press enter to start", italic_style)),
            SessionPhase::Starting => Line::from(Span::styled("starting...", italic_style)),
            SessionPhase::CountingDown => Line::from(Span::styled(
                self.countdown.map(|s| s.to_string()).unwrap_or_default(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            SessionPhase::Active => match orchestrator.progress() {
                Some(progress) => word_line(
                    progress,
                    matches!(self.last_outcome, Some(InputOutcome::Mistake(_))),
                    [green_bold_style, red_bold_style, underlined_dim_bold_style, dim_bold_style],
                ),
                None => Line::default(),
            },
            SessionPhase::Finishing | SessionPhase::WaitingRestart => Line::default(),
        };
        // when the word fits on one line centering it gives a nice zen feeling
        let alignment = if main_line.width() <= max_width {
            Alignment::Center
        } else {
            Alignment::Left
        };
        Paragraph::new(main_line)
            .alignment(alignment)
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);

        if phase == SessionPhase::Active {
            let input = format!("> {}_", self.buffer);
            let alignment = if input.width() <= chunks[4].width as usize {
                Alignment::Center
            } else {
                Alignment::Right
            };
            Paragraph::new(Span::styled(input, bold_style))
                .alignment(alignment)
                .render(chunks[4], buf);
        }

        if let Some(notice) = &self.notice {
            Paragraph::new(Span::styled(
                notice.to_string(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[6], buf);
        }

        if phase == SessionPhase::WaitingRestart {
            if let Some(summary) = self.summary() {
                Paragraph::new(Span::styled(summary_text(summary), bold_style))
                    .alignment(Alignment::Center)
                    .render(chunks[7], buf);
            }
        }

        let control = orchestrator.control_label();
        let mut legend = vec![format!("(enter) {control}")];
        if phase == SessionPhase::WaitingRestart {
            legend.push("(space) replay".to_owned());
        }
        if orchestrator.can_retry_submission() {
            legend.push("(space) discard and replay".to_owned());
        }
        legend.push("(tab) category".to_owned());
        if self.has_cue() {
            let state = if self.cue_enabled() { "on" } else { "off" };
            legend.push(format!("(ctrl+b) sound {state}"));
        }
        legend.push("(esc)ape".to_owned());

        let control_style = if control.is_busy() {
            dim_bold_style.patch(italic_style)
        } else {
            italic_style
        };
        Paragraph::new(Span::styled(legend.iter().join(" / "), control_style))
            .render(chunks[8], buf);
    }
}

/// Typed part green, the next expected char underlined, the rest dim.
fn word_line(progress: &TypingProgress, missed: bool, styles: [Style; 4]) -> Line<'static> {
    let [typed_style, missed_style, current_style, pending_style] = styles;
    let mut spans = progress
        .typed_prefix()
        .chars()
        .map(|c| Span::styled(visible(c), typed_style))
        .collect::<Vec<Span>>();

    let mut rest = progress.target_word().chars().skip(progress.cursor_index());
    if let Some(expected) = rest.next() {
        let style = if missed { missed_style } else { current_style };
        spans.push(Span::styled(visible(expected), style));
    }
    let pending = rest.map(visible).collect::<String>();
    if !pending.is_empty() {
        spans.push(Span::styled(pending, pending_style));
    }
    Line::from(spans)
}

fn summary_text(summary: &SessionSummary) -> String {
    let mut text = format!(
        "{} words in {}   {} wpm   {}% acc ({})",
        summary.counters.words_completed,
        format_elapsed(summary.elapsed),
        summary.metrics.wpm,
        summary.metrics.accuracy,
        summary.metrics.source,
    );
    if summary.is_guest {
        text.push_str("   guest");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SessionStart;
    use crate::orchestrator::{GameSettings, Orchestrator, Wake};
    use crate::runtime::GameEvent;
    use crate::words::WordBank;
    use chrono::Utc;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn create_test_app() -> App {
        let words = WordBank::from_json(
            r#"{ "categories": [
                { "id": "basic", "name": "Basic", "words": ["hello world"] },
                { "id": "code", "name": "Code", "words": ["fn"] }
            ] }"#,
        )
        .unwrap();
        let settings = GameSettings {
            words_per_session: 1,
            ..GameSettings::default()
        };
        App::new(Orchestrator::new(words, None, settings))
    }

    fn activate(app: &mut App) {
        let now = Utc::now();
        app.on_event(GameEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), now);
        let generation = app.orchestrator.generation();
        app.on_event(
            GameEvent::SessionStarted {
                generation,
                result: Ok(SessionStart::Guest),
            },
            now,
        );
        for _ in 0..4 {
            app.on_event(
                GameEvent::Wake {
                    generation,
                    wake: Wake::CountdownStep,
                },
                now,
            );
        }
    }

    fn render(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_ui_idle() {
        let app = create_test_app();
        let rendered = render(&app, 80, 24);

        assert!(rendered.contains("[Basic]"));
        assert!(rendered.contains("Code"));
        assert!(rendered.contains("press enter to start"));
        assert!(rendered.contains("(enter) start"));
    }

    #[test]
    fn test_ui_countdown() {
        let mut app = create_test_app();
        let now = Utc::now();
        app.on_event(GameEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), now);
        app.on_event(
            GameEvent::SessionStarted {
                generation: app.orchestrator.generation(),
                result: Ok(SessionStart::Guest),
            },
            now,
        );

        let rendered = render(&app, 80, 24);
        assert!(rendered.contains('3'));
        assert!(rendered.contains("get ready"));
    }

    #[test]
    fn test_ui_active_word_shows_spaces() {
        let mut app = create_test_app();
        activate(&mut app);

        let rendered = render(&app, 80, 24);
        assert!(rendered.contains("hello"));
        assert!(rendered.contains(SPACE_GLYPH));
        assert!(rendered.contains("(enter) stop"));
        assert!(rendered.contains("0:00"));
    }

    #[test]
    fn test_ui_summary_after_finish() {
        let mut app = create_test_app();
        app.orchestrator.select_category("code");
        activate(&mut app);
        let now = Utc::now();
        for c in ['f', 'n'] {
            app.on_event(GameEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)), now);
        }

        let rendered = render(&app, 100, 24);
        assert!(rendered.contains("1 words in"));
        assert!(rendered.contains("estimated"));
        assert!(rendered.contains("guest"));
        assert!(rendered.contains("(space) replay"));
    }

    #[test]
    fn test_ui_small_area() {
        let mut app = create_test_app();
        activate(&mut app);

        // must not panic
        let _ = render(&app, 20, 5);
        let _ = render(&app, 0, 0);
    }

    #[test]
    fn test_word_line_marks_mistake() {
        let progress = TypingProgress::new("ab");
        let styles = [
            Style::default(),
            Style::default().fg(Color::Red),
            Style::default(),
            Style::default(),
        ];

        let line = word_line(&progress, true, styles);

        assert_eq!(line.spans[0].content, "a");
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
        assert_eq!(line.spans[1].content, "b");
    }
}
