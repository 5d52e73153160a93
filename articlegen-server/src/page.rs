//! HTML for the single-page form.

use articlegen_core::{InvokeError, PromptForm, PromptSet, Role, Step, Temperature};
use pulldown_cmark::{html, Event, Options, Parser};

/// What to show in the result area under the form.
#[derive(Debug)]
pub enum Notice {
    Saved,
    SaveFailed(String),
    Article(String),
    InvalidInput(String),
    Failed(InvokeError),
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markdown to HTML. Raw HTML in the source is shown as text, not passed through.
fn markdown(src: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(src, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(src.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn text_input(name: &str, label: &str, value: &str) -> String {
    format!(
        r#"<label for="{name}">{label}</label>
<input type="text" id="{name}" name="{name}" value="{value}">
"#,
        value = escape(value)
    )
}

fn text_area(name: &str, label: &str, value: &str) -> String {
    format!(
        r#"<label for="{name}">{label}</label>
<textarea id="{name}" name="{name}" rows="3">{value}</textarea>
"#,
        value = escape(value)
    )
}

fn notice_html(notice: &Notice) -> String {
    match notice {
        Notice::Saved => {
            r#"<div class="success">Configuration saved successfully!</div>"#.to_string()
        }
        Notice::SaveFailed(msg) => format!(
            r#"<div class="error">Failed to save configuration: {}</div>"#,
            escape(msg)
        ),
        Notice::InvalidInput(msg) => format!(r#"<div class="error">{}</div>"#, escape(msg)),
        Notice::Article(article) => format!(
            r#"<div class="success">Research article generated successfully!</div>
<article class="result">{}</article>"#,
            markdown(article)
        ),
        Notice::Failed(err) => {
            let mut html = format!(r#"<div class="error">{}</div>"#, escape(&err.to_string()));
            match err {
                InvokeError::MissingInput | InvokeError::Busy => {}
                InvokeError::ApiConnectivity { status, body } => {
                    if let Some(status) = status {
                        html.push_str(&format!(
                            r#"<div class="error">Response Status Code: {status}</div>"#
                        ));
                    }
                    html.push_str(&format!(
                        r#"<div class="error">Response Content: <pre>{}</pre></div>"#,
                        escape(body)
                    ));
                }
                InvokeError::Pipeline { trace, .. } => {
                    html.push_str(&format!(
                        r#"<div class="error">Traceback: <pre>{}</pre></div>"#,
                        escape(trace)
                    ));
                }
            }
            html
        }
    }
}

/// Render the whole page for the given session state.
pub fn render(prompts: &PromptSet, temperature: Temperature, notice: Option<&Notice>) -> String {
    let mut agents = String::new();
    for role in Role::ALL {
        let p = prompts.agent(role);
        let label = role.label();
        agents.push_str(&format!("<h3>{label} Agent</h3>\n"));
        agents.push_str(&text_input(
            &PromptForm::agent_field(role, "role"),
            &format!("{label} Role"),
            &p.role,
        ));
        agents.push_str(&text_area(
            &PromptForm::agent_field(role, "goal"),
            &format!("{label} Goal"),
            &p.goal,
        ));
        agents.push_str(&text_area(
            &PromptForm::agent_field(role, "backstory"),
            &format!("{label} Backstory"),
            &p.backstory,
        ));
    }

    let mut tasks = String::new();
    for step in Step::ALL {
        tasks.push_str(&text_area(
            &PromptForm::task_field(step),
            &format!("{} Task Description", step.label()),
            prompts.task(step),
        ));
    }

    let notice = notice.map(notice_html).unwrap_or_default();
    let temperature = temperature.value();
    let (min, max) = (Temperature::MIN, Temperature::MAX);

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Research Article Generator</title>
<style>
*{{box-sizing:border-box}}
body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;max-width:760px;margin:0 auto;padding:32px 16px;color:#262730}}
h1{{font-size:32px}}
h2{{margin-top:32px;border-bottom:1px solid #e6e6e6;padding-bottom:4px}}
label{{display:block;font-size:14px;margin:12px 0 4px}}
input[type=text],input[type=password],textarea{{width:100%;padding:8px;border:1px solid #d0d0d8;border-radius:6px;font:inherit}}
input[type=range]{{width:100%}}
.buttons{{margin:24px 0;display:flex;gap:12px}}
button{{padding:10px 18px;border-radius:8px;border:1px solid #d0d0d8;background:#fff;font:inherit;cursor:pointer}}
button.primary{{background:#ff4b4b;border-color:#ff4b4b;color:#fff}}
.success{{background:#e8f9ee;color:#177233;padding:12px;border-radius:6px;margin:8px 0}}
.error{{background:#ffecec;color:#7d1a1a;padding:12px;border-radius:6px;margin:8px 0}}
.error pre{{white-space:pre-wrap;margin:8px 0 0}}
.result{{line-height:1.6;margin-top:16px}}
.result pre{{white-space:pre-wrap;background:#f6f6f9;padding:8px;border-radius:6px}}
footer{{margin-top:48px;border-top:1px solid #e6e6e6;padding-top:12px;color:#808495}}
</style>
</head>
<body>
<h1>Research Article Generator</h1>
<form method="post" action="/" enctype="multipart/form-data">
<label for="file">Upload your transcript file</label>
<input type="file" id="file" name="file" accept=".txt,text/plain">
<label for="api_key">Enter your Azure OpenAI API Key</label>
<input type="password" id="api_key" name="api_key" autocomplete="off">
<label for="temperature">Set the temperature for the output (0 = deterministic, 1 = creative): <output id="temperature_value">{temperature}</output></label>
<input type="range" id="temperature" name="temperature" min="{min}" max="{max}" step="0.05" value="{temperature}" oninput="document.getElementById('temperature_value').value=this.value">
<h2>Agent Prompts</h2>
{agents}<h2>Task Descriptions</h2>
{tasks}<div class="buttons">
<button type="submit" name="action" value="save">Save Configuration</button>
<button type="submit" name="action" value="generate" class="primary">Generate Research Article</button>
</div>
</form>
<section id="result">
{notice}
</section>
<footer>Tapestry Networks</footer>
</body>
</html>"##
    )
}
