//! Landing page and the live dashboard shell, rendered with minijinja.
//!
//! Templates ending in `.html` are auto-escaped; `dashboard.js` is included raw.

use minijinja::{Environment, UndefinedBehavior, context};

use crate::error::GarnerError;

const LANDING_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Garner</title></head>
<body>
<h1>Garner</h1>
<p>collect your favorites with ease</p>
{% if flash %}<p class="alert" role="alert">{{ flash }}</p>{% endif %}
<h2>Login</h2>
<a href="/login">Sign in with Google</a>
</body>
</html>
"#;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Garner</title></head>
<body>
<header>
<h1>Garner</h1>
<small>{{ email }}</small>
<button id="logout">Logout</button>
</header>
<p id="error" role="alert" hidden></p>
<p id="success" role="status" hidden></p>
<form id="add">
<input name="title" type="text" placeholder="Title" required>
<input name="url" type="url" placeholder="URL" required>
<button type="submit">Add</button>
</form>
<p id="status">Loading Garner...</p>
<ul id="bookmarks"></ul>
<script>
{% include "dashboard.js" %}
</script>
</body>
</html>
"#;

const DASHBOARD_JS: &str = r#"{% raw %}
const live = new EventSource('/dashboard/live');
let view = null;
const $ = (id) => document.getElementById(id);
const post = (path, body) => fetch(`/dashboard/live/${view}${path}`, {
  method: 'POST',
  body: new URLSearchParams(body || {}),
}).then((r) => r.ok ? r.json() : {});

live.addEventListener('view', (e) => { view = e.data; });
live.addEventListener('navigate', (e) => { live.close(); location.href = e.data; });
live.addEventListener('state', (e) => render(JSON.parse(e.data)));

function banner(el, text) { el.hidden = !text; el.textContent = text || ''; }

function render(s) {
  banner($('error'), s.error);
  banner($('success'), s.success);
  $('status').textContent = s.loading ? 'Loading Garner...'
    : s.bookmarks.length === 0 ? 'No bookmarks yet. Add one to get started!' : '';
  const list = $('bookmarks');
  list.replaceChildren(...s.bookmarks.map((b) => {
    const li = document.createElement('li');
    const title = document.createElement('strong');
    title.textContent = b.title;
    const link = document.createElement('a');
    if (/^https?:\/\//i.test(b.url)) link.href = b.url;
    link.textContent = b.url;
    link.target = '_blank'; link.rel = 'noopener noreferrer';
    const del = document.createElement('button');
    const pending = s.deleting === b.id;
    del.disabled = pending;
    del.textContent = pending ? 'Deleting...' : 'Delete';
    del.onclick = () => post(`/bookmarks/${encodeURIComponent(b.id)}/delete`);
    li.append(title, ' ', link, ' ', del);
    return li;
  }));
}

$('add').addEventListener('submit', (e) => {
  e.preventDefault();
  const form = e.target;
  post('/bookmarks', { title: form.title.value, url: form.url.value })
    .then((r) => { if (r.outcome === 'completed') form.reset(); });
});
$('error').addEventListener('click', () => post('/dismiss', { banner: 'error' }));
$('success').addEventListener('click', () => post('/dismiss', { banner: 'success' }));
$('logout').addEventListener('click', () => post('/sign-out'));
{% endraw %}"#;

fn environment() -> Result<Environment<'static>, GarnerError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("landing.html", LANDING_HTML)?;
    env.add_template("dashboard.html", DASHBOARD_HTML)?;
    env.add_template("dashboard.js", DASHBOARD_JS)?;
    Ok(env)
}

pub fn landing_page(flash: Option<&str>) -> Result<String, GarnerError> {
    let env = environment()?;
    let html = env
        .get_template("landing.html")?
        .render(context! { flash => flash })?;
    Ok(html)
}

pub fn dashboard_page(email: Option<&str>) -> Result<String, GarnerError> {
    let env = environment()?;
    let html = env
        .get_template("dashboard.html")?
        .render(context! { email => email.unwrap_or_default() })?;
    Ok(html)
}
