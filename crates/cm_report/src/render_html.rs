//! Single-file HTML report. Offline: inline CSS, no external assets.
//!
//! The template is embedded and registered under a `.html` name so minijinja
//! auto-escapes every interpolated field.

use minijinja::{context, Environment};

use crate::model::ReportModel;
use crate::ReportError;

const TEMPLATE_NAME: &str = "report.html";

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{{ m.title }}</title>
<style>
body{font-family:system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Arial,sans-serif;margin:24px;}
h1,h2,h3{margin:0.2em 0;}
.muted{opacity:0.8}
.na{color:#999;font-style:italic}
table{border-collapse:collapse;margin-bottom:1em}
td,th{padding:4px 8px;border-bottom:1px solid #ddd;text-align:left}
td.num{text-align:right;font-variant-numeric:tabular-nums}
</style>
</head>
<body>
<h1>{{ m.title }}</h1>
{% if m.latest %}
<h3>Latest year per dataset</h3>
<table>
<tr><th>Dataset</th><th>Year</th><th>Cut-off</th></tr>
{% for l in m.latest %}<tr><td>{{ l.dataset }}</td><td>{{ l.year }}</td><td>{{ l.cutoff }}</td></tr>
{% endfor %}</table>
{% endif %}
{% for s in m.sections %}
<h2>{{ s.heading }}</h2>
<table>
<tr><th>Subject</th><th>Series</th><th>Period</th><th>Value</th></tr>
{% for r in s.rows %}<tr><td>{{ r.subject }}</td><td>{{ r.series }}</td><td>{{ r.period }}</td>
{% if r.available %}<td class="num">{{ r.value }}{% if r.detail %} <span class="muted">({{ r.detail }})</span>{% endif %}</td>
{% else %}<td class="na">{{ r.value }}</td>{% endif %}</tr>
{% endfor %}</table>
{% endfor %}
<p>{{ m.evaluated }} metrics evaluated, {{ m.failed }} unavailable</p>
{% if m.failures %}<ul class="muted">
{% for f in m.failures %}<li>{{ f }}</li>
{% endfor %}</ul>{% endif %}
<footer class="muted">
<div>Report {{ m.ids.report_id }}</div>
{% if m.ids.run_id %}<div>Run {{ m.ids.run_id }}</div>{% endif %}
{% if m.ids.engine %}<div>Engine {{ m.ids.engine }}</div>{% endif %}
</footer>
</body>
</html>
"#;

pub fn render_html(model: &ReportModel) -> Result<String, ReportError> {
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| ReportError::Template(format!("add_template: {e}")))?;
    let tmpl = env
        .get_template(TEMPLATE_NAME)
        .map_err(|e| ReportError::Template(format!("get_template: {e}")))?;
    tmpl.render(context! { m => model })
        .map_err(|e| ReportError::Template(format!("render: {e}")))
}
