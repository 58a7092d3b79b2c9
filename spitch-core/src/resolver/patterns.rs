//! Deterministic rule tier.
//!
//! Rules are checked in declaration order against the lower-cased input. The
//! first rule whose trigger fires decides the outcome: if its extraction
//! yields no steps the tier reports no match rather than trying later rules.

use super::{ResolveContext, ResolverStrategy};
use crate::error::Result;
use crate::types::{ActionKind, ActionPlan, ActionStep, PlanSource};
use chrono::Local;
use regex::Regex;

const SITES: &[(&str, &str)] = &[
    ("youtube", "https://www.youtube.com"),
    ("facebook", "https://www.facebook.com"),
    ("twitter", "https://www.twitter.com"),
    ("instagram", "https://www.instagram.com"),
    ("gmail", "https://mail.google.com"),
    ("github", "https://www.github.com"),
    ("linkedin", "https://www.linkedin.com"),
];

const MAIL_URL: &str = "https://mail.google.com";

type Trigger = fn(&str) -> bool;
type Extract = Box<dyn Fn(&str) -> Vec<ActionStep> + Send + Sync>;

struct Rule {
    intent: &'static str,
    trigger: Trigger,
    extract: Extract,
}

impl Rule {
    fn new(
        intent: &'static str,
        trigger: Trigger,
        extract: impl Fn(&str) -> Vec<ActionStep> + Send + Sync + 'static,
    ) -> Self {
        Self {
            intent,
            trigger,
            extract: Box::new(extract),
        }
    }
}

/// Rule-based resolver; every plan it returns has confidence 1.0.
pub struct PatternStrategy {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for PatternStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternStrategy")
            .field("rules", &self.rules.iter().map(|r| r.intent).collect::<Vec<_>>())
            .finish()
    }
}

fn re(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(pattern)?)
}

fn has_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// First capture group, trimmed, if non-empty.
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn google_search_url(query: &str) -> String {
    format!("https://www.google.com/search?q={}", urlencoding::encode(query))
}

pub fn youtube_search_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

fn open_website(url: impl Into<String>) -> ActionStep {
    ActionStep::new(ActionKind::OpenWebsite).with("url", url.into())
}

fn open_app(app: impl Into<String>) -> ActionStep {
    ActionStep::new(ActionKind::OpenApp).with("app", app.into())
}

fn press_key(key: &str) -> ActionStep {
    ActionStep::new(ActionKind::PressKey).with("key", key)
}

fn type_text(text: impl Into<String>) -> ActionStep {
    ActionStep::new(ActionKind::TypeText).with("text", text.into())
}

fn single(kind: ActionKind) -> impl Fn(&str) -> Vec<ActionStep> + Send + Sync + 'static {
    move |_| vec![ActionStep::new(kind.clone())]
}

fn rules() -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    // --- web -----------------------------------------------------------

    let search = re(r"search\s+(?:google|web|internet)?\s*(?:for\s+)?(.+)")?;
    rules.push(Rule::new(
        "web_search",
        |c| c.contains("search") && has_any(c, &["google", "web", "internet"]),
        move |c| {
            capture(&search, c)
                .map(|q| vec![open_website(google_search_url(&q))])
                .unwrap_or_default()
        },
    ));

    rules.push(Rule::new(
        "open_website",
        |c| c.contains("open") && SITES.iter().any(|(site, _)| c.contains(site)),
        |c| {
            SITES
                .iter()
                .find(|(site, _)| c.contains(site))
                .map(|(_, url)| vec![open_website(*url)])
                .unwrap_or_default()
        },
    ));

    // --- browser automation --------------------------------------------

    let goto = re(r"(?:go to|navigate to|open)\s+([^\s]+\.[^\s,]+)")?;
    let browse_search = re(r"(?:search|find)\s+(?:for\s+)?(.+?)(?:\s+and|\s+then|$)")?;
    rules.push(Rule::new(
        "browser_automation",
        |c| {
            (c.contains("open browser") || c.contains("start browser"))
                && !c.contains("automation")
        },
        move |c| {
            let mut steps = vec![ActionStep::new(ActionKind::OpenBrowser)];
            if let Some(url) = capture(&goto, c) {
                steps.push(ActionStep::new(ActionKind::NavigateToUrl).with("url", url));
            } else if let Some(query) = capture(&browse_search, c) {
                steps.push(
                    ActionStep::new(ActionKind::NavigateToUrl).with("url", google_search_url(&query)),
                );
            }
            steps
        },
    ));

    let fill = re(
        r#"fill\s+(?:the\s+)?(?:form\s+)?(?:field\s+)?(.+?)\s+with\s+["']?(.+?)["']?(?:\s+and|\s+then|$)"#,
    )?;
    rules.push(Rule::new(
        "fill_form",
        |c| c.contains("fill") && has_any(c, &["form", "field", "box", "input"]),
        move |c| {
            let Some(caps) = fill.captures(c) else {
                return Vec::new();
            };
            let field = caps.get(1).map_or("", |m| m.as_str()).trim();
            let value = caps.get(2).map_or("", |m| m.as_str()).trim();
            let mut steps = vec![ActionStep::new(ActionKind::FillFormField)
                .with("selector", field)
                .with("value", value)];
            if has_any(c, &["submit", "press enter", "click search"]) {
                steps.push(ActionStep::new(ActionKind::SubmitForm));
            }
            steps
        },
    ));

    let click = re(r"click\s+(?:on\s+)?(?:the\s+)?(.+?)(?:\s+button|\s+link|\s+element|$)")?;
    rules.push(Rule::new(
        "click",
        |c| c.contains("click") && has_any(c, &["button", "link", "element"]),
        move |c| {
            capture(&click, c)
                .map(|element| {
                    let selector = format!(
                        "button:contains('{element}'), a:contains('{element}'), [value*='{element}']"
                    );
                    vec![ActionStep::new(ActionKind::ClickOnElement).with("selector", selector)]
                })
                .unwrap_or_default()
        },
    ));

    let shot_name = re(r"(?:save as|name it|called)\s+(.+)")?;
    rules.push(Rule::new(
        "page_screenshot",
        |c| c.contains("screenshot") && c.contains("page"),
        move |c| {
            let mut step = ActionStep::new(ActionKind::TakePageScreenshot);
            if let Some(name) = capture(&shot_name, c) {
                step = step.with("filename", name);
            }
            vec![step]
        },
    ));

    let extract = re(r"(?:extract|get)\s+(?:all\s+)?(?:text from\s+)?(.+)")?;
    rules.push(Rule::new(
        "extract_text",
        |c| c.contains("extract") && c.contains("text"),
        move |c| {
            capture(&extract, c)
                .map(|selector| {
                    vec![ActionStep::new(ActionKind::ExtractText)
                        .with("selector", selector)
                        .with("all", c.contains("all"))]
                })
                .unwrap_or_default()
        },
    ));

    rules.push(Rule::new(
        "close_browser",
        |c| c.contains("close browser"),
        single(ActionKind::CloseBrowser),
    ));

    // --- media -----------------------------------------------------------

    let spotify = re(r"play\s+(.+?)(?:\s+on\s+spotify|$)")?;
    rules.push(Rule::new(
        "play_spotify",
        |c| c.contains("open") && c.contains("spotify") && c.contains("play"),
        move |c| {
            capture(&spotify, c)
                .map(|song| vec![ActionStep::new(ActionKind::PlaySpotifySong).with("song", song)])
                .unwrap_or_default()
        },
    ));

    let youtube = re(r"play\s+(.+?)\s+on\s+youtube")?;
    rules.push(Rule::new(
        "play_youtube",
        |c| c.contains("play") && c.contains("youtube"),
        move |c| {
            capture(&youtube, c)
                .map(|q| vec![open_website(youtube_search_url(&q))])
                .unwrap_or_default()
        },
    ));

    // --- app + action ----------------------------------------------------

    let open_word = re(r"open\s+(\w+)")?;
    let calc_expr = re(r"calculate\s+(.+)")?;
    {
        let open_word = open_word.clone();
        rules.push(Rule::new(
            "open_and_calculate",
            |c| c.contains("open") && c.contains("and") && c.contains("calculate"),
            move |c| {
                let mut steps = Vec::new();
                if let Some(app) = capture(&open_word, c) {
                    steps.push(open_app(app));
                }
                if let Some(expression) = capture(&calc_expr, c) {
                    steps.push(ActionStep::new(ActionKind::Calculate).with("expression", expression));
                }
                steps
            },
        ));
    }

    let quoted_text = re(r#"(?:type|write)\s+(?:["'])(.+?)(?:["'])"#)?;
    let loose_text =
        re(r"(?:type|write)\s+(.+?)(?:\s+inside|\s+in\s+the|\s+and\s+save|\s+save|\s+to\s+file|$)")?;
    let save_name = re(r"(?:called|named|save\s+as)\s+([^\s,]+)")?;
    {
        let open_word = open_word.clone();
        rules.push(Rule::new(
            "open_and_write",
            |c| c.contains("open") && (c.contains("write") || c.contains("type")),
            move |c| {
                let mut steps = Vec::new();
                if let Some(app) = capture(&open_word, c) {
                    steps.push(open_app(app));
                }
                if let Some(text) = capture(&quoted_text, c).or_else(|| capture(&loose_text, c)) {
                    steps.push(type_text(text));
                }
                if c.contains("save") {
                    steps.push(press_key("ctrl+s"));
                    if let Some(name) = capture(&save_name, c) {
                        steps.push(type_text(name));
                        steps.push(press_key("enter"));
                    }
                }
                steps
            },
        ));
    }

    // --- files -----------------------------------------------------------

    let create_name = re(r"(?:create|write)\s+file\s+(?:called\s+)?([^\s]+)")?;
    let create_content = re(r"(?:with content|containing)\s+(.+)")?;
    rules.push(Rule::new(
        "create_file",
        |c| c.contains("create file") || c.contains("write file"),
        move |c| {
            capture(&create_name, c)
                .map(|path| {
                    let content = capture(&create_content, c).unwrap_or_default();
                    vec![ActionStep::new(ActionKind::WriteFile)
                        .with("file_path", path)
                        .with("content", content)]
                })
                .unwrap_or_default()
        },
    ));

    let delete = re(r"(?:delete|remove)\s+file\s+(.+)")?;
    rules.push(Rule::new(
        "delete_file",
        |c| c.contains("delete file") || c.contains("remove file"),
        move |c| {
            capture(&delete, c)
                .map(|path| vec![ActionStep::new(ActionKind::DeleteFile).with("file_path", path)])
                .unwrap_or_default()
        },
    ));

    let rename = re(r"rename\s+file\s+(.+?)\s+to\s+(.+)")?;
    rules.push(Rule::new(
        "rename_file",
        |c| c.contains("rename file"),
        move |c| {
            let Some(caps) = rename.captures(c) else {
                return Vec::new();
            };
            let old = caps.get(1).map_or("", |m| m.as_str()).trim();
            let new = caps.get(2).map_or("", |m| m.as_str()).trim();
            vec![ActionStep::new(ActionKind::RenameFile)
                .with("old_path", old)
                .with("new_path", new)]
        },
    ));

    // --- system ----------------------------------------------------------

    let number = re(r"(\d+)")?;
    rules.push(Rule::new(
        "set_volume",
        |c| c.contains("volume"),
        move |c| {
            capture(&number, c)
                .and_then(|n| n.parse::<u64>().ok())
                .map(|level| vec![ActionStep::new(ActionKind::SetVolume).with("level", level)])
                .unwrap_or_default()
        },
    ));

    rules.push(Rule::new(
        "mute",
        |c| c.contains("mute"),
        |c| {
            let level = if c.contains("unmute") { 50 } else { 0 };
            vec![ActionStep::new(ActionKind::SetVolume).with("level", level)]
        },
    ));

    rules.push(Rule::new(
        "lock_screen",
        |c| c.contains("lock") && (c.contains("screen") || c.contains("computer")),
        single(ActionKind::LockScreen),
    ));

    rules.push(Rule::new(
        "power",
        |c| has_any(c, &["shutdown", "restart", "sleep"]),
        |c| {
            let action = ["shutdown", "restart", "sleep"]
                .into_iter()
                .find(|a| c.contains(a))
                .unwrap_or("shutdown");
            vec![ActionStep::new(ActionKind::Shutdown).with("action", action)]
        },
    ));

    let clipboard = re(r#"copy\s+["']?(.+?)["']?\s+to\s+clipboard"#)?;
    rules.push(Rule::new(
        "copy_to_clipboard",
        |c| c.contains("copy") && c.contains("clipboard"),
        move |c| {
            capture(&clipboard, c)
                .map(|text| vec![ActionStep::new(ActionKind::CopyToClipboard).with("text", text)])
                .unwrap_or_default()
        },
    ));

    let close = re(r"(?:close|kill)\s+(\w+)")?;
    rules.push(Rule::new(
        "close_app",
        |c| c.contains("close") || c.contains("kill"),
        move |c| {
            capture(&close, c)
                .map(|process| {
                    vec![ActionStep::new(ActionKind::KillProcess).with("process", process)]
                })
                .unwrap_or_default()
        },
    ));

    rules.push(Rule::new(
        "screenshot",
        |c| c.contains("screenshot"),
        |_| {
            let filename = Local::now()
                .format("screenshot_%Y%m%d_%H%M%S.png")
                .to_string();
            vec![ActionStep::new(ActionKind::TakeScreenshot).with("filename", filename)]
        },
    ));

    rules.push(Rule::new(
        "email",
        |c| c.contains("email"),
        |_| vec![open_website(MAIL_URL)],
    ));

    let calculate = re(r"(?:calculate|what is)\s+(.+)")?;
    rules.push(Rule::new(
        "calculate",
        |c| c.contains("calculate") || c.contains("what is"),
        move |c| {
            capture(&calculate, c)
                .map(|e| vec![ActionStep::new(ActionKind::Calculate).with("expression", e)])
                .unwrap_or_default()
        },
    ));

    let song = re(r"play\s+(?:music|song)\s+(.+)")?;
    rules.push(Rule::new(
        "play_music",
        |c| c.contains("play music") || c.contains("play song"),
        move |c| match capture(&song, c) {
            Some(query) => vec![open_website(youtube_search_url(&query))],
            None => vec![open_app("spotify")],
        },
    ));

    // --- file intelligence -----------------------------------------------

    let in_dir = re(r"in\s+(.+)")?;
    {
        let in_dir = in_dir.clone();
        rules.push(Rule::new(
            "organize_files",
            |c| c.contains("organize") && c.contains("file"),
            move |c| {
                let mut step = ActionStep::new(ActionKind::OrganizeFiles);
                if let Some(dir) = capture(&in_dir, c) {
                    step = step.with("directory", dir);
                }
                vec![step]
            },
        ));
    }

    rules.push(Rule::new(
        "recent_files",
        |c| c.contains("recent file") || c.contains("show recent"),
        single(ActionKind::FindRecentFiles),
    ));

    let file_query = re(r"(?:search|find).*?files?\s+(?:named\s+|called\s+)?(.+)")?;
    rules.push(Rule::new(
        "search_files",
        |c| c.contains("search") && c.contains("file"),
        move |c| {
            capture(&file_query, c)
                .map(|q| vec![ActionStep::new(ActionKind::SearchFiles).with("query", q)])
                .unwrap_or_default()
        },
    ));

    rules.push(Rule::new(
        "find_duplicates",
        |c| c.contains("find duplicate") || c.contains("duplicate file"),
        move |c| {
            let dir = capture(&in_dir, c).unwrap_or_else(|| ".".to_string());
            vec![ActionStep::new(ActionKind::FindDuplicates).with("directory", dir)]
        },
    ));

    // --- git ---------------------------------------------------------------

    rules.push(Rule::new(
        "git_status",
        |c| c.contains("git status") || c.contains("check git"),
        single(ActionKind::GitStatus),
    ));

    let message = re(r"(?:message|msg)\s+(.+)")?;
    rules.push(Rule::new(
        "git_commit",
        |c| c.contains("commit"),
        move |c| {
            let message = capture(&message, c).unwrap_or_else(|| "Update".to_string());
            vec![ActionStep::new(ActionKind::GitCommit).with("message", message)]
        },
    ));

    rules.push(Rule::new("git_push", |c| c.contains("push"), single(ActionKind::GitPush)));
    rules.push(Rule::new("git_pull", |c| c.contains("pull"), single(ActionKind::GitPull)));

    let run = re(r"(?:run|execute)\s+(?:command\s+)?(.+)")?;
    rules.push(Rule::new(
        "run_command",
        |c| c.contains("run command") || c.contains("execute"),
        move |c| {
            capture(&run, c)
                .map(|cmd| vec![ActionStep::new(ActionKind::RunShellCommand).with("command", cmd)])
                .unwrap_or_default()
        },
    ));

    // --- apps --------------------------------------------------------------

    {
        let open_word = open_word.clone();
        rules.push(Rule::new(
            "open_apps",
            |c| c.contains("open") && c.contains("and"),
            move |c| {
                open_word
                    .captures_iter(c)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| open_app(m.as_str()))
                    .collect()
            },
        ));
    }

    rules.push(Rule::new(
        "open_app",
        |c| c.contains("open"),
        move |c| capture(&open_word, c).map(|app| vec![open_app(app)]).unwrap_or_default(),
    ));

    Ok(rules)
}

impl PatternStrategy {
    pub fn new() -> Result<Self> {
        Ok(Self { rules: rules()? })
    }

    /// Match `input` against the rules.
    pub fn parse(&self, input: &str) -> Option<ActionPlan> {
        let command = input.to_lowercase();
        let rule = self.rules.iter().find(|r| (r.trigger)(&command))?;
        let steps = (rule.extract)(&command);
        if steps.is_empty() {
            tracing::debug!(rule = rule.intent, "Rule fired but extracted no steps");
            return None;
        }
        Some(ActionPlan::from_steps(rule.intent, steps, 1.0, PlanSource::Pattern))
    }
}

impl ResolverStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn resolve(&self, input: &str, _ctx: &ResolveContext<'_>) -> Result<Option<ActionPlan>> {
        Ok(self.parse(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(input: &str) -> Option<ActionPlan> {
        PatternStrategy::new().unwrap().parse(input)
    }

    fn kinds(plan: &ActionPlan) -> Vec<&str> {
        plan.steps.iter().map(|s| s.kind.as_str()).collect()
    }

    #[test]
    fn web_search_builds_google_url() {
        let plan = parse("Search Google for rust traits").unwrap();
        assert_eq!(plan.intent, "web_search");
        assert_eq!(plan.confidence, 1.0);
        assert_eq!(plan.source, PlanSource::Pattern);
        assert_eq!(
            plan.steps[0].param_str("url"),
            Some("https://www.google.com/search?q=rust%20traits")
        );
    }

    #[test]
    fn known_sites() {
        let plan = parse("open gmail").unwrap();
        assert_eq!(plan.steps[0].param_str("url"), Some("https://mail.google.com"));
        assert_eq!(plan.entity("url"), Some("https://mail.google.com"));
    }

    #[test]
    fn open_and_calculate() {
        let plan = parse("open calculator and calculate 12*7").unwrap();
        assert_eq!(kinds(&plan), vec!["open_app", "calculate"]);
        assert_eq!(plan.steps[0].param_str("app"), Some("calculator"));
        assert_eq!(plan.steps[1].param_str("expression"), Some("12*7"));
        assert_eq!(plan.entity("app"), Some("calculator"));
    }

    #[test]
    fn open_write_and_save_as() {
        let plan = parse("open notepad and write 'hello world' and save as notes.txt").unwrap();
        assert_eq!(
            kinds(&plan),
            vec!["open_app", "type_text", "press_key", "type_text", "press_key"]
        );
        assert_eq!(plan.steps[1].param_str("text"), Some("hello world"));
        assert_eq!(plan.steps[2].param_str("key"), Some("ctrl+s"));
        assert_eq!(plan.steps[3].param_str("text"), Some("notes.txt"));
        assert_eq!(plan.steps[4].param_str("key"), Some("enter"));
    }

    #[test]
    fn loose_text_stops_at_keywords() {
        let plan = parse("open notepad and type buy milk inside the file").unwrap();
        assert_eq!(plan.steps[1].param_str("text"), Some("buy milk"));
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn file_rules() {
        let plan = parse("create file notes.txt with content hello there").unwrap();
        assert_eq!(plan.steps[0].params["file_path"], json!("notes.txt"));
        assert_eq!(plan.steps[0].params["content"], json!("hello there"));

        let plan = parse("delete file old.log").unwrap();
        assert_eq!(kinds(&plan), vec!["delete_file"]);

        let plan = parse("rename file a.txt to b.txt").unwrap();
        assert_eq!(plan.steps[0].param_str("old_path"), Some("a.txt"));
        assert_eq!(plan.steps[0].param_str("new_path"), Some("b.txt"));
        assert_eq!(plan.entity("file_path"), Some("b.txt"));
    }

    #[test]
    fn system_rules() {
        assert_eq!(parse("set volume to 30").unwrap().steps[0].params["level"], json!(30));
        assert_eq!(parse("mute").unwrap().steps[0].params["level"], json!(0));
        assert_eq!(parse("unmute").unwrap().steps[0].params["level"], json!(50));
        assert_eq!(kinds(&parse("lock the screen").unwrap()), vec!["lock_screen"]);
        assert_eq!(parse("restart now").unwrap().steps[0].param_str("action"), Some("restart"));
        assert_eq!(
            parse("copy \"abc\" to clipboard").unwrap().steps[0].param_str("text"),
            Some("abc")
        );
        assert_eq!(
            parse("close notepad").unwrap().steps[0].param_str("process"),
            Some("notepad")
        );
        let shot = parse("take a screenshot").unwrap();
        assert!(shot.steps[0].param_str("filename").unwrap().starts_with("screenshot_"));
    }

    #[test]
    fn calculation_forms() {
        let plan = parse("what is 3 + 4").unwrap();
        assert_eq!(plan.intent, "calculate");
        assert_eq!(plan.steps[0].param_str("expression"), Some("3 + 4"));
    }

    #[test]
    fn media_rules() {
        let plan = parse("open spotify and play bohemian rhapsody").unwrap();
        assert_eq!(plan.steps[0].param_str("song"), Some("bohemian rhapsody"));

        let plan = parse("play lofi beats on youtube").unwrap();
        assert_eq!(
            plan.steps[0].param_str("url"),
            Some("https://www.youtube.com/results?search_query=lofi%20beats")
        );

        assert_eq!(parse("play music").unwrap().steps[0].param_str("app"), Some("spotify"));
    }

    #[test]
    fn file_intelligence_and_git() {
        assert_eq!(
            parse("organize files in downloads").unwrap().steps[0].param_str("directory"),
            Some("downloads")
        );
        assert_eq!(kinds(&parse("show recent files").unwrap()), vec!["find_recent_files"]);
        assert_eq!(
            parse("search for file named report").unwrap().steps[0].param_str("query"),
            Some("report")
        );
        assert_eq!(
            parse("find duplicate files").unwrap().steps[0].param_str("directory"),
            Some(".")
        );
        assert_eq!(kinds(&parse("git status").unwrap()), vec!["git_status"]);
        assert_eq!(
            parse("commit with message fix typo").unwrap().steps[0].param_str("message"),
            Some("fix typo")
        );
        assert_eq!(
            parse("git commit").unwrap().steps[0].param_str("message"),
            Some("Update")
        );
        assert_eq!(kinds(&parse("git push").unwrap()), vec!["git_push"]);
        assert_eq!(kinds(&parse("git pull").unwrap()), vec!["git_pull"]);
        assert_eq!(
            parse("run command ls -la").unwrap().steps[0].param_str("command"),
            Some("ls -la")
        );
    }

    #[test]
    fn browser_automation() {
        let plan = parse("open browser and go to example.com").unwrap();
        assert_eq!(kinds(&plan), vec!["open_browser", "navigate_to_url"]);
        assert_eq!(plan.steps[1].param_str("url"), Some("example.com"));

        let plan = parse("fill the search box with laptop and submit").unwrap();
        assert_eq!(kinds(&plan), vec!["fill_form_field", "submit_form"]);
        assert_eq!(plan.steps[0].param_str("value"), Some("laptop"));

        assert_eq!(kinds(&parse("close browser").unwrap()), vec!["close_browser"]);
    }

    #[test]
    fn apps() {
        let plan = parse("open notepad").unwrap();
        assert_eq!(plan.intent, "open_app");
        assert_eq!(plan.steps[0].param_str("app"), Some("notepad"));

        let plan = parse("open chrome and open slack").unwrap();
        assert_eq!(kinds(&plan), vec!["open_app", "open_app"]);
        assert_eq!(plan.entity("app"), Some("slack"));
    }

    #[test]
    fn earlier_rule_wins() {
        // both the email and the calculate trigger fire; email is declared first
        assert_eq!(parse("email what is 2+2").unwrap().intent, "email");
    }

    #[test]
    fn fired_rule_without_extraction_is_no_match() {
        // volume trigger fires but there is no level; later rules are not tried
        assert!(parse("turn the volume up and open notepad").is_none());
    }

    #[test]
    fn unrelated_input_is_no_match() {
        assert!(parse("tell me a joke").is_none());
        assert!(parse("").is_none());
    }
}
