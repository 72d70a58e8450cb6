//! End-to-end rendering against the fixture views on disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use viewforge::{
    CompileError, CompileOptions, CompiledTemplate, Delimiters, DirSource, EmbeddedSource,
    ExecutionError, FunctionMap, HookError, HookPhase, Hooks, MemorySource, SourceError,
    SourceProvider, TemplateCache, TemplateEngine, TemplateFn, TemplateSource, ViewConfig,
    ViewError, ViewManager,
};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn titlecase(args: &[Value]) -> Result<Value, String> {
    let text = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| "titlecase expects a string".to_string())?;
    let words: Vec<String> = text
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    Ok(Value::String(words.join(" ")))
}

/// Counts every read that reaches the directory.
#[derive(Clone)]
struct Counting {
    inner: Arc<DirSource>,
    reads: Arc<AtomicUsize>,
}

impl Counting {
    fn new(root: PathBuf) -> Self {
        Self {
            inner: Arc::new(DirSource::new(root)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SourceProvider for Counting {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.open(path)
    }
}

fn manager_over(source: impl SourceProvider + 'static, cache: bool) -> ViewManager {
    ViewManager::builder(source)
        .layout("main", ["head", "header", "footer"])
        .layout("page", Vec::<String>::new())
        .function("titlecase", titlecase)
        .cache(cache)
        .build()
        .unwrap()
}

fn manager() -> ViewManager {
    manager_over(DirSource::new(fixtures().join("views")), false)
}

fn render_string(manager: &ViewManager, view: &str, data: &Value) -> String {
    let mut out: Vec<u8> = Vec::new();
    manager.render(&mut out, view, data).unwrap();
    String::from_utf8(out).unwrap()
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in {haystack:?}"))
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_render_with_default_layout() {
    let output = render_string(&manager(), "site/index", &json!({"title": "home"}));

    let head = position(&output, "<head>");
    let title = position(&output, "<title>Home</title>");
    let header = position(&output, "<header>Header</header>");
    let body = position(&output, "<h1>Hello World</h1>");
    let footer = position(&output, "<footer>Footer</footer>");
    assert!(head < title && title < header && header < body && body < footer);
}

#[test]
fn test_render_partial_uses_view_alone() {
    let manager = manager();
    let mut out: Vec<u8> = Vec::new();
    manager
        .render_partial(&mut out, "site/partial", &json!({"title": "standalone"}))
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.contains("<head>"));
    assert!(output.contains("<title>Standalone</title>"));
    assert!(output.contains("<h1>Standalone</h1>"));
    assert!(!output.contains("<header>"));
}

#[test]
fn test_render_named_layout() {
    let manager = manager();
    let mut out: Vec<u8> = Vec::new();
    manager
        .render_layout(&mut out, "page", "user/login", &json!({"username": "ada"}))
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.starts_with("<main><form"));
    assert!(output.contains(r#"value="ada""#));
}

#[test]
fn test_files_lists_composition_order() {
    let manager = manager();

    let paths: Vec<String> = manager
        .files(Some("main"), "site/index")
        .unwrap()
        .into_iter()
        .map(|file| file.path)
        .collect();
    assert_eq!(
        paths,
        [
            "layouts/main.tmpl",
            "layouts/partials/head.tmpl",
            "layouts/partials/header.tmpl",
            "layouts/partials/footer.tmpl",
            "site/index.tmpl",
        ]
    );

    let files = manager.files(None, "site/partial").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "site/partial.tmpl");
}

#[test]
fn test_theme_with_layouts_as_partials() {
    let manager = ViewManager::builder(DirSource::new(fixtures().join("themes")))
        .theme("default")
        .partials_in_layouts_dir(false)
        .partials_dir("layouts")
        .layout("main", ["header", "footer"])
        .function("titlecase", titlecase)
        .build()
        .unwrap();

    let paths: Vec<String> = manager
        .files(Some("main"), "site/index")
        .unwrap()
        .into_iter()
        .map(|file| file.path)
        .collect();
    assert_eq!(
        paths,
        [
            "default/layouts/main.tmpl",
            "default/layouts/header.tmpl",
            "default/layouts/footer.tmpl",
            "default/site/index.tmpl",
        ]
    );

    let output = render_string(&manager, "site/index", &json!({"title": "home"}));
    assert!(output.contains("<title>Home</title>"));
    assert!(output.contains("<h1>Hello World</h1>"));
    assert!(output.contains("<footer>I am footer</footer>"));
}

#[test]
fn test_manager_from_yaml_config() {
    let views = fixtures().join("views");
    let config = ViewConfig::from_file(views.join("views.yaml"))
        .unwrap()
        .with_function("titlecase", titlecase);
    let manager = ViewManager::new(DirSource::new(views), config);

    assert!(manager.layouts().contains("main"));
    assert!(manager.layouts().contains("page"));

    let output = render_string(&manager, "site/index", &json!({"title": "home"}));
    assert!(output.contains("<header>Header</header>"));
}

#[test]
fn test_embedded_source() {
    static FILES: &[(&str, &str)] = &[
        ("layouts/main.tmpl", "<body>{% include view %}</body>"),
        ("site/index.tmpl", "<p>{{ title }}</p>"),
    ];
    let source = EmbeddedSource::new(FILES).with_source_dir("/nonexistent/viewforge/views");
    assert!(!source.should_hot_reload());

    let manager = ViewManager::builder(source)
        .layout("main", Vec::<String>::new())
        .build()
        .unwrap();
    let output = render_string(&manager, "site/index", &json!({"title": "embedded"}));
    assert_eq!(output, "<body><p>embedded</p></body>");
}

#[test]
fn test_custom_delimiters() {
    let source = MemorySource::new()
        .with("layouts/main.tmpl", "<div>{% include view %}</div>")
        .with("site/index.tmpl", "[[ title ]] {{ title }}");
    let manager = ViewManager::builder(source)
        .layout("main", Vec::<String>::new())
        .delimiters("[[", "]]")
        .build()
        .unwrap();

    let output = render_string(&manager, "site/index", &json!({"title": "x"}));
    assert_eq!(output, "<div>x {{ title }}</div>");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_layout_reads_nothing() {
    let source = Counting::new(fixtures().join("views"));
    let manager = manager_over(source.clone(), true);

    let mut out: Vec<u8> = Vec::new();
    let err = manager
        .render_layout(&mut out, "invalid", "site/index", &json!({}))
        .unwrap_err();

    assert!(err.is_unknown_layout());
    assert_eq!(err.to_string(), r#"no such layout "invalid""#);
    assert_eq!(source.reads(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_missing_view_with_layout() {
    let manager = manager();
    let mut out: Vec<u8> = Vec::new();
    let err = manager
        .render(&mut out, "nonexistent", &json!({"title": "x"}))
        .unwrap_err();

    match err {
        ViewError::SourceUnavailable { path, source } => {
            assert_eq!(path, "nonexistent.tmpl");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.is_empty());
}

#[test]
fn test_missing_view_without_layout() {
    let manager = manager();
    let err = manager
        .render_partial(&mut std::io::sink(), "nonexistent", &json!({}))
        .unwrap_err();
    assert!(err.is_source_unavailable());
}

#[test]
fn test_failed_composition_is_not_cached() {
    let source = Arc::new(MemorySource::new().with("layouts/main.tmpl", "[{% include view %}]"));
    let manager = ViewManager::builder(Arc::clone(&source))
        .layout("main", Vec::<String>::new())
        .build()
        .unwrap();
    let data = json!({"title": "late"});

    assert!(manager
        .render(&mut std::io::sink(), "site/late", &data)
        .unwrap_err()
        .is_source_unavailable());
    assert!(manager.cache().is_empty());

    source.insert("site/late.tmpl", "{{ title }}");
    let mut out: Vec<u8> = Vec::new();
    manager.render(&mut out, "site/late", &data).unwrap();
    assert_eq!(out, b"[late]");
}

#[test]
fn test_function_error_is_execution_error() {
    let source = MemorySource::new().with("site/shout.tmpl", "{{ titlecase(1) }}");
    let manager = ViewManager::builder(source)
        .function("titlecase", titlecase)
        .build()
        .unwrap();

    let err = manager
        .render_partial(&mut std::io::sink(), "site/shout", &json!({}))
        .unwrap_err();
    match err {
        ViewError::Execution(err) => {
            assert_eq!(err.template, "site/shout");
            assert!(err.message.contains("titlecase expects a string"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn test_before_hooks_run_in_order_before_output() {
    let mut manager = manager();
    manager.on_before_render(|_, out| {
        out.write_all(b"foo")
            .map_err(|e| HookError::before_render("write failed").with_source(e))
    });
    manager.on_before_render(|_, out| {
        out.write_all(b"bar")
            .map_err(|e| HookError::before_render("write failed").with_source(e))
    });
    manager.on_after_render(|_, out| {
        out.write_all(b"<!-- done -->")
            .map_err(|e| HookError::after_render("write failed").with_source(e))
    });

    let mut out: Vec<u8> = Vec::new();
    manager
        .render_partial(&mut out, "site/partial", &json!({"title": "x"}))
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.starts_with("foobar<head>"));
    assert!(output.ends_with("<!-- done -->"));
}

#[test]
fn test_before_hook_failure_writes_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (second, after) = (Arc::clone(&calls), Arc::clone(&calls));

    let mut manager = manager();
    manager.on_before_render(|_, _| Err(HookError::before_render("forbidden")));
    manager.on_before_render(move |_, _| {
        second.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    manager.on_after_render(move |_, _| {
        after.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let mut out: Vec<u8> = Vec::new();
    let err = manager
        .render(&mut out, "site/index", &json!({"title": "home"}))
        .unwrap_err();

    match err {
        ViewError::Hook(err) => {
            assert_eq!(err.phase, HookPhase::BeforeRender);
            assert_eq!(err.message, "forbidden");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_after_hook_failure_keeps_output() {
    let mut manager = manager();
    manager.on_after_render(|_, _| Err(HookError::after_render("audit log unavailable")));

    let mut out: Vec<u8> = Vec::new();
    let err = manager
        .render(&mut out, "site/index", &json!({"title": "home"}))
        .unwrap_err();

    assert!(matches!(err, ViewError::Hook(ref e) if e.phase == HookPhase::AfterRender));
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("<h1>Hello World</h1>"));
}

#[test]
fn test_resolution_failure_runs_no_hooks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut manager = manager();
    manager.on_before_render(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(manager
        .render_layout(&mut std::io::sink(), "invalid", "site/index", &json!({}))
        .is_err());
    assert!(manager
        .render(&mut std::io::sink(), "nonexistent", &json!({}))
        .is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hooks_see_render_event() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let mut manager = manager();
    manager.on_before_render(move |event, _| {
        log.lock().unwrap().push(format!(
            "{}:{}:{}",
            event.layout.unwrap_or("-"),
            event.view,
            event.data["title"]
        ));
        Ok(())
    });

    let data = json!({"title": "home"});
    manager.render(&mut std::io::sink(), "site/index", &data).unwrap();
    manager
        .render_partial(&mut std::io::sink(), "site/partial", &data)
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![r#"main:site/index:"home""#, r#"-:site/partial:"home""#]
    );
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_cached_template_is_shared() {
    let manager = manager_over(DirSource::new(fixtures().join("views")), true);

    let first = manager.template(Some("main"), "site/index").unwrap();
    let second = manager.template(Some("main"), "site/index").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let partial = manager.template(None, "site/index").unwrap();
    assert!(!Arc::ptr_eq(&first, &partial));
    assert_eq!(manager.cache().len(), 2);
    assert_eq!(manager.cache().stats(), (1, 2));
}

#[test]
fn test_cache_hit_reads_no_sources() {
    let source = Counting::new(fixtures().join("views"));
    let manager = manager_over(source.clone(), true);
    let data = json!({"title": "home"});

    let first = render_string(&manager, "site/index", &data);
    assert_eq!(source.reads(), 5);

    let second = render_string(&manager, "site/index", &data);
    assert_eq!(source.reads(), 5);
    assert_eq!(first, second);
}

#[test]
fn test_disabled_cache_reads_every_time() {
    let source = Counting::new(fixtures().join("views"));
    let manager = manager_over(source.clone(), false);
    let data = json!({"title": "home"});

    render_string(&manager, "site/index", &data);
    render_string(&manager, "site/index", &data);
    assert_eq!(source.reads(), 10);
    assert!(manager.cache().is_empty());
}

#[test]
fn test_disabled_cache_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("site")).unwrap();
    std::fs::write(dir.path().join("site/index.tmpl"), "one").unwrap();

    let manager = ViewManager::builder(DirSource::new(dir.path()))
        .cache(false)
        .build()
        .unwrap();

    let render = |manager: &ViewManager| {
        let mut out: Vec<u8> = Vec::new();
        manager
            .render_partial(&mut out, "site/index", &json!({}))
            .unwrap();
        String::from_utf8(out).unwrap()
    };

    assert_eq!(render(&manager), "one");
    std::fs::write(dir.path().join("site/index.tmpl"), "two").unwrap();
    assert_eq!(render(&manager), "two");

    manager.set_cache(true);
    assert_eq!(render(&manager), "two");
    std::fs::write(dir.path().join("site/index.tmpl"), "three").unwrap();
    assert_eq!(render(&manager), "two");
}

#[test]
fn test_toggling_cache_keeps_entries() {
    let manager = manager_over(DirSource::new(fixtures().join("views")), true);
    let cached = manager.template(None, "site/index").unwrap();

    manager.set_cache(false);
    let fresh = manager.template(None, "site/index").unwrap();
    assert!(!Arc::ptr_eq(&cached, &fresh));

    manager.set_cache(true);
    let again = manager.template(None, "site/index").unwrap();
    assert!(Arc::ptr_eq(&cached, &again));
}

#[test]
fn test_setters_do_not_invalidate_cache() {
    let mut manager = manager_over(DirSource::new(fixtures().join("views")), true);
    let data = json!({"title": "home"});
    let before = render_string(&manager, "site/index", &data);

    manager.set_suffix(".html");
    manager.set_delimiters("<%", "%>");
    assert_eq!(render_string(&manager, "site/index", &data), before);

    manager.cache().clear();
    let err = manager
        .render(&mut std::io::sink(), "site/index", &data)
        .unwrap_err();
    match err {
        ViewError::SourceUnavailable { path, .. } => assert_eq!(path, "layouts/main.html"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_shared_cache_between_managers() {
    let cache = Arc::new(TemplateCache::new(true));
    let views = fixtures().join("views");

    let plain = ViewManager::builder(DirSource::new(&views))
        .layout("main", ["head", "header", "footer"])
        .function("titlecase", titlecase)
        .shared_cache(Arc::clone(&cache))
        .build()
        .unwrap();
    let framed = ViewManager::builder(DirSource::new(&views))
        .layout("main", ["head", "header", "footer"])
        .function("titlecase", titlecase)
        .shared_cache(Arc::clone(&cache))
        .before_render(|_, out| {
            out.write_all(b"<!-- framed -->")
                .map_err(|e| HookError::before_render("write failed").with_source(e))
        })
        .build()
        .unwrap();

    let first = plain.template(Some("main"), "site/index").unwrap();
    let second = framed.template(Some("main"), "site/index").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    let data = json!({"title": "home"});
    assert!(!render_string(&plain, "site/index", &data).starts_with("<!--"));
    assert!(render_string(&framed, "site/index", &data).starts_with("<!-- framed -->"));
}

#[test]
fn test_concurrent_renders_compose_once() {
    let source = Counting::new(fixtures().join("views"));
    let manager = Arc::new(manager_over(source.clone(), true));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                render_string(&manager, "site/index", &json!({"title": "home"}))
            })
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(source.reads(), 5);
}

// ============================================================================
// Custom engines
// ============================================================================

/// What one `compile` call received.
#[derive(Debug, Clone)]
struct Compilation {
    sources: Vec<TemplateSource>,
    delimiters: Delimiters,
    functions: Vec<String>,
}

/// Records every compilation and renders the source names it was given.
#[derive(Clone, Default)]
struct Recording {
    compilations: Arc<Mutex<Vec<Compilation>>>,
}

impl Recording {
    fn compilations(&self) -> Vec<Compilation> {
        self.compilations.lock().unwrap().clone()
    }
}

impl TemplateEngine for Recording {
    fn compile(
        &self,
        sources: &[TemplateSource],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, CompileError> {
        self.compilations.lock().unwrap().push(Compilation {
            sources: sources.to_vec(),
            delimiters: options.delimiters.clone(),
            functions: options
                .functions
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        });
        let entry = sources
            .first()
            .ok_or_else(|| CompileError::new("", "nothing to compile"))?;
        Ok(Arc::new(Listing {
            entry: entry.name.clone(),
            names: sources.iter().map(|source| source.name.clone()).collect(),
            titlecase: options.functions.get("titlecase").cloned(),
        }))
    }
}

struct Listing {
    entry: String,
    names: Vec<String>,
    titlecase: Option<TemplateFn>,
}

impl CompiledTemplate for Listing {
    fn name(&self) -> &str {
        &self.entry
    }

    fn execute(&self, out: &mut dyn Write, data: &Value) -> Result<(), ExecutionError> {
        let mut text = self.names.join(",");
        if let Some(titlecase) = &self.titlecase {
            let title = titlecase(&[data["title"].clone()])
                .map_err(|msg| ExecutionError::new(self.entry.clone(), msg))?;
            text.push('|');
            text.push_str(title.as_str().unwrap_or_default());
        }
        out.write_all(text.as_bytes())
            .map_err(|e| ExecutionError::new(self.entry.clone(), e.to_string()))
    }
}

#[test]
fn test_engine_receives_ordered_sources_and_options() {
    let views = fixtures().join("views");
    let engine = Recording::default();
    let manager = ViewManager::builder(DirSource::new(&views))
        .engine(engine.clone())
        .layout("main", ["head", "header", "footer"])
        .function("titlecase", titlecase)
        .delimiters("[[", "]]")
        .cache(true)
        .build()
        .unwrap();

    let data = json!({"title": "home"});
    let output = render_string(&manager, "site/index", &data);
    assert_eq!(
        output,
        "layouts/main,layouts/partials/head,layouts/partials/header,layouts/partials/footer,site/index|Home"
    );
    render_string(&manager, "site/index", &data);

    let compilations = engine.compilations();
    assert_eq!(compilations.len(), 1);
    let compilation = &compilations[0];

    let expected = [
        ("layouts/main", "layouts/main.tmpl"),
        ("layouts/partials/head", "layouts/partials/head.tmpl"),
        ("layouts/partials/header", "layouts/partials/header.tmpl"),
        ("layouts/partials/footer", "layouts/partials/footer.tmpl"),
        ("site/index", "site/index.tmpl"),
    ];
    assert_eq!(compilation.sources.len(), expected.len());
    for (source, (name, path)) in compilation.sources.iter().zip(expected) {
        assert_eq!(source.name, name);
        assert_eq!(source.path, path);
        assert_eq!(
            source.content,
            std::fs::read_to_string(views.join(path)).unwrap()
        );
    }
    assert_eq!(compilation.delimiters, Delimiters::new("[[", "]]"));
    assert_eq!(compilation.functions, ["titlecase"]);
}

#[test]
fn test_with_engine_and_configured_functions() {
    let views = fixtures().join("views");
    let mut functions = FunctionMap::new();
    functions.insert("titlecase", titlecase);
    let shout: TemplateFn = Arc::new(|_: &[Value]| -> Result<Value, String> { Ok(json!("!")) });
    let config = ViewConfig::default()
        .with_functions(functions)
        .with_shared_function("shout", shout);

    let engine = Recording::default();
    let hooks = Hooks::new().before_render(|event, out| {
        write!(out, "[{}]", event.view)
            .map_err(|e| HookError::before_render("write failed").with_source(e))
    });
    let manager = ViewManager::new(DirSource::new(&views), config)
        .with_engine(engine.clone())
        .with_hooks(hooks);

    assert!(!manager.hooks().is_empty());
    assert_eq!(
        manager.source().open("site/partial.tmpl").unwrap(),
        std::fs::read(views.join("site/partial.tmpl")).unwrap()
    );

    let mut out: Vec<u8> = Vec::new();
    manager
        .render_partial(&mut out, "site/partial", &json!({"title": "alone"}))
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "[site/partial]site/partial|Alone");

    let compilations = engine.compilations();
    assert_eq!(compilations.len(), 1);
    assert_eq!(compilations[0].sources.len(), 1);
    assert_eq!(compilations[0].sources[0].path, "site/partial.tmpl");
    assert_eq!(compilations[0].delimiters, Delimiters::default());
    assert_eq!(compilations[0].functions, ["shout", "titlecase"]);
}
