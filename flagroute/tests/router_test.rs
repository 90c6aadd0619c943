//! Integration tests for registration and command execution

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use flagroute::{Bound, Context, CtxNext, Error, Next, Options, Router};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Key(i32);

fn recorder() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

fn no_args() -> Vec<String> {
    Vec::new()
}

#[derive(Debug, Default, Clone, Options)]
pub struct AllTypes {
    #[flag(short = "i", long = "int", dft = "-111")]
    pub int: i64,
    #[flag(short = "u", long = "uint", dft = "999")]
    pub uint: u32,
    #[flag(short = "f", long = "float", dft = "1.111")]
    pub float: f64,
    #[flag(short = "b", long = "bool", dft = "false")]
    pub flag: bool,
    #[flag(short = "s", long = "str", dft = "abc")]
    pub text: String,
    #[flag(short = "d", long = "dur", dft = "1s")]
    pub dur: Duration,
    #[flag(short = "t", long = "time", dft = "2024-01-02T15:04:05")]
    pub time: chrono::DateTime<Local>,
    #[flag(short = "l", long = "list", dft = "1,2,3")]
    pub list: Vec<i32>,
    #[flag(short = "m", long = "map", dft = "a:1,b:2,c:3")]
    pub map: HashMap<String, i32>,
    #[flag(short = "x", long = "list-map", dft = "a:1,b:2,c:3;x:7,y:8,z:9")]
    pub list_map: Vec<HashMap<String, i32>>,
    #[flag(short = "y", long = "map-list", dft = "a:1,a:2,a:3,b:4,b:5,b:6")]
    pub map_list: HashMap<String, Vec<i32>>,
    #[flag(dft = "42", desc = "never shown in usage")]
    pub unnamed: i32,
}

#[test]
fn test_handle() {
    let mut router = Router::new("handle", "");
    let run = Rc::new(Cell::new(false));
    let ran = run.clone();
    router.handle(move || ran.set(true)).unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert!(run.get());
}

#[test]
fn test_handle_group() {
    let mut router = Router::new("group", "");
    let run = Rc::new(Cell::new(false));
    let ran = run.clone();
    router.handle_group("test", "", move || ran.set(true)).unwrap();

    router.run(Context::background(), ["test"]).unwrap();
    assert!(run.get());
}

#[test]
fn test_each_handler_shape_runs_once() {
    let count = Rc::new(Cell::new(0));

    let mut plain = Router::new("plain", "");
    let c = count.clone();
    plain.handle(move || c.set(c.get() + 1)).unwrap();

    let mut with_ctx = Router::new("ctx", "");
    let c = count.clone();
    with_ctx
        .handle(move |_: Context| c.set(c.get() + 1))
        .unwrap();

    let mut with_opts = Router::new("opts", "");
    let c = count.clone();
    with_opts
        .handle(move |_: AllTypes| c.set(c.get() + 1))
        .unwrap();

    let mut with_both = Router::new("both", "");
    let c = count.clone();
    with_both
        .handle(move |_: Context, _: Bound<AllTypes>| c.set(c.get() + 1))
        .unwrap();

    for (expected, router) in [plain, with_ctx, with_opts, with_both].iter().enumerate() {
        router.run(Context::background(), no_args()).unwrap();
        assert_eq!(count.get(), expected + 1);
    }
}

#[test]
fn test_use() {
    let mut router = Router::new("use", "");
    let log = recorder();
    let (a, b, h) = (log.clone(), log.clone(), log.clone());
    router.middleware(move || a.borrow_mut().push("first".into())).unwrap();
    router.middleware(move || b.borrow_mut().push("second".into())).unwrap();
    router.handle(move || h.borrow_mut().push("handler".into())).unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(*log.borrow(), vec!["first", "second", "handler"]);
}

#[test]
fn test_use_next() {
    let id = Rc::new(Cell::new(0));
    let run = Rc::new(RefCell::new([0; 3]));
    let incr = |id: &Cell<i32>| {
        id.set(id.get() + 1);
        id.get()
    };

    let mut router = Router::new("next", "");
    let (i, r) = (id.clone(), run.clone());
    router
        .middleware(move |next: Next| {
            r.borrow_mut()[0] = incr(&i);
            next.run();
        })
        .unwrap();
    let (i, r) = (id.clone(), run.clone());
    router
        .middleware(move |next: Next| {
            next.run();
            r.borrow_mut()[1] = incr(&i);
        })
        .unwrap();
    let (i, r) = (id.clone(), run.clone());
    router.handle(move || r.borrow_mut()[2] = incr(&i)).unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(*run.borrow(), [1, 3, 2]);
}

#[test]
fn test_two_middlewares_count_one_to_five() {
    let counter = Rc::new(Cell::new(0));
    let seen = recorder();
    let tick = {
        let counter = counter.clone();
        let seen = seen.clone();
        move |label: &str| {
            counter.set(counter.get() + 1);
            seen.borrow_mut().push(format!("{label}{}", counter.get()));
        }
    };

    let mut router = Router::new("count", "");
    for name in ["a", "b"] {
        let tick = tick.clone();
        router
            .middleware(move |ctx: Context, next: CtxNext| {
                tick(name);
                next.run(ctx);
                tick(name);
            })
            .unwrap();
    }
    let t = tick.clone();
    router.handle(move || t("h")).unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(*seen.borrow(), vec!["a1", "b2", "h3", "b4", "a5"]);
}

#[test]
fn test_every_middleware_shape_wraps_handler() {
    fn run_with(register: impl FnOnce(&mut Router, Rc<RefCell<Vec<String>>>)) -> Vec<String> {
        let log = recorder();
        let mut router = Router::new("shape", "");
        register(&mut router, log.clone());
        let h = log.clone();
        router.handle(move || h.borrow_mut().push("handler".into())).unwrap();
        router.run(Context::background(), no_args()).unwrap();
        let result = log.borrow().clone();
        result
    }
    let before = |log: &Rc<RefCell<Vec<String>>>| log.borrow_mut().push("before".into());
    let after = |log: &Rc<RefCell<Vec<String>>>| log.borrow_mut().push("after".into());
    let auto = vec!["before", "handler"];
    let wrapped = vec!["before", "handler", "after"];

    assert_eq!(
        run_with(|r, log| {
            r.middleware(move || before(&log)).unwrap();
        }),
        auto
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |_: Context| before(&log)).unwrap();
        }),
        auto
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |_: AllTypes| before(&log)).unwrap();
        }),
        auto
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |_: Context, _: Bound<AllTypes>| before(&log))
                .unwrap();
        }),
        auto
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |next: Next| {
                before(&log);
                next.run();
                after(&log);
            })
            .unwrap();
        }),
        wrapped
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |_: Context, next: Next| {
                before(&log);
                next.run();
                after(&log);
            })
            .unwrap();
        }),
        wrapped
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |_: Bound<AllTypes>, next: Next| {
                before(&log);
                next.run();
                after(&log);
            })
            .unwrap();
        }),
        wrapped
    );
    assert_eq!(
        run_with(|r, log| {
            r.middleware(move |ctx: Context, _: AllTypes, next: CtxNext| {
                before(&log);
                next.run(ctx);
                after(&log);
            })
            .unwrap();
        }),
        wrapped
    );
}

#[test]
fn test_middleware_can_stop_the_chain() {
    let mut router = Router::new("stop", "");
    let log = recorder();
    let (a, h) = (log.clone(), log.clone());
    router
        .middleware(move |_: Next| a.borrow_mut().push("guard".into()))
        .unwrap();
    router.handle(move || h.borrow_mut().push("handler".into())).unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(*log.borrow(), vec!["guard"]);
}

#[test]
fn test_handle_context() {
    let mut router = Router::new("handle_context", "");
    let seen = Rc::new(Cell::new(None));
    let s = seen.clone();
    router
        .handle(move |ctx: Context| s.set(ctx.value::<Key>().copied()))
        .unwrap();

    router
        .run(Context::background().with_value(Key(123)), no_args())
        .unwrap();
    assert_eq!(seen.get(), Some(Key(123)));
}

#[test]
fn test_use_context() {
    let mut router = Router::new("use_context", "");
    let log = recorder();

    let outer = log.clone();
    router
        .middleware(move |ctx: Context, next: CtxNext| {
            next.run(ctx.clone());
            outer
                .borrow_mut()
                .push(format!("outer after: {:?}", ctx.value::<Key>()));
        })
        .unwrap();
    let setter = log.clone();
    router
        .middleware(move |ctx: Context, next: CtxNext| {
            setter
                .borrow_mut()
                .push(format!("setter before: {:?}", ctx.value::<Key>()));
            next.run(ctx.with_value(Key(123)));
        })
        .unwrap();
    let inner = log.clone();
    router
        .middleware(move |ctx: Context| {
            inner
                .borrow_mut()
                .push(format!("inner: {:?}", ctx.value::<Key>()));
        })
        .unwrap();
    let handler = log.clone();
    router
        .handle(move |ctx: Context| {
            handler
                .borrow_mut()
                .push(format!("handler: {:?}", ctx.value::<Key>()));
        })
        .unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "setter before: None",
            "inner: Some(Key(123))",
            "handler: Some(Key(123))",
            "outer after: None",
        ]
    );
}

#[test]
fn test_handle_options_defaults() {
    let mut router = Router::new("defaults", "");
    let got = Rc::new(RefCell::new(None));
    let g = got.clone();
    router
        .handle(move |opts: AllTypes| *g.borrow_mut() = Some(opts))
        .unwrap();

    router.run(Context::background(), no_args()).unwrap();
    let opts = got.borrow_mut().take().unwrap();
    assert_eq!(opts.int, -111);
    assert_eq!(opts.uint, 999);
    assert_eq!(opts.float, 1.111);
    assert!(!opts.flag);
    assert_eq!(opts.text, "abc");
    assert_eq!(opts.dur, Duration::from_secs(1));
    assert_eq!(
        opts.time,
        Local.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap()
    );
    assert_eq!(opts.list, vec![1, 2, 3]);
    assert_eq!(
        opts.map,
        HashMap::from([("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)])
    );
    assert_eq!(opts.list_map.len(), 2);
    assert_eq!(opts.list_map[0]["c"], 3);
    assert_eq!(opts.list_map[1]["x"], 7);
    assert_eq!(opts.map_list["a"], vec![1, 2, 3]);
    assert_eq!(opts.map_list["b"], vec![4, 5, 6]);
    assert_eq!(opts.unnamed, 0);
}

#[test]
fn test_handle_options_override() {
    let mut router = Router::new("handle_options", "");
    let got = Rc::new(RefCell::new(None));
    let g = got.clone();
    router
        .handle(move |ctx: Context, opts: Bound<AllTypes>| {
            *g.borrow_mut() = Some((ctx.value::<Key>().copied(), opts.get()));
        })
        .unwrap();

    router
        .run(
            Context::background().with_value(Key(123)),
            [
                "-i", "456", "-b", "--str=xyz", "-d", "1m30s", "-l", "7", "-l", "8,9", "-m",
                "z:26",
            ],
        )
        .unwrap();
    let (key, opts) = got.borrow_mut().take().unwrap();
    assert_eq!(key, Some(Key(123)));
    assert_eq!(opts.int, 456);
    assert!(opts.flag);
    assert_eq!(opts.text, "xyz");
    assert_eq!(opts.dur, Duration::from_secs(90));
    assert_eq!(opts.list, vec![7, 8, 9]);
    assert_eq!(opts.map, HashMap::from([("z".to_string(), 26)]));
    assert_eq!(opts.uint, 999);

    router
        .run(Context::background(), ["--int", "-5", "--bool=false"])
        .unwrap();
    let (_, opts) = got.borrow_mut().take().unwrap();
    assert_eq!(opts.int, -5);
    assert!(!opts.flag);
    assert_eq!(opts.text, "xyz", "values persist until parsed again");
}

#[test]
fn test_invalid_value_keeps_usage() {
    let mut router = Router::new("invalid", "");
    router.handle(|_: AllTypes| {}).unwrap();

    let err = router
        .run(Context::background(), ["-i", "abc"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { ref flag, .. } if flag == "-i/--int"));
    assert!(matches!(err.root(), Error::MalformedDefault { .. }));
    assert!(err.usage().unwrap().contains("--int"));
}

#[test]
fn test_help_omits_unnamed_fields() {
    let mut router = Router::new("usage", "prints usage");
    router.handle(|_: AllTypes| {}).unwrap();

    let err = router
        .run(Context::background(), ["--help"])
        .unwrap_err();
    let Error::Help { usage } = err else {
        panic!("expected help, got {err:?}");
    };
    assert!(usage.contains("prints usage"));
    assert!(usage.contains("--list-map"));
    assert!(usage.contains("[default: 1,2,3]"));
    assert!(!usage.contains("never shown in usage"));
    assert_eq!(router.describe().options.len(), 11);
}

#[test]
fn test_group_and_stmt_scoping() {
    let log = recorder();
    let push = |label: &'static str| {
        let log = log.clone();
        move || log.borrow_mut().push(label.to_string())
    };

    let mut router = Router::new("scopes", "");
    router.middleware(push("root")).unwrap();
    router
        .stmt(|r| {
            r.middleware(push("stmt"))?;
            r.handle_group("inside", "", push("inside"))?;
            Ok(())
        })
        .unwrap();
    router
        .group("outside", "", |r| {
            r.middleware(push("group"))?;
            r.handle(push("outside"))?;
            r.handle_group("leaf", "", push("leaf"))?;
            Ok(())
        })
        .unwrap();

    router.run(Context::background(), ["inside"]).unwrap();
    assert_eq!(*log.borrow(), vec!["root", "stmt", "inside"]);

    log.borrow_mut().clear();
    router.run(Context::background(), ["outside"]).unwrap();
    assert_eq!(*log.borrow(), vec!["root", "group", "outside"]);

    log.borrow_mut().clear();
    router.run(Context::background(), ["outside", "leaf"]).unwrap();
    assert_eq!(*log.borrow(), vec!["root", "group", "leaf"]);
}

#[test]
fn test_stmt_handler_belongs_to_enclosing_command() {
    let log = recorder();
    let mut router = Router::new("stmt_handler", "");
    let (m, h) = (log.clone(), log.clone());
    router
        .stmt(|r| {
            r.middleware(move || m.borrow_mut().push("stmt".into()))?;
            r.handle(move || h.borrow_mut().push("handler".into()))?;
            Ok(())
        })
        .unwrap();

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(*log.borrow(), vec!["stmt", "handler"]);

    let err = router.handle(|| {}).err();
    assert!(matches!(err, Some(Error::DuplicateHandler { .. })));
}

#[test]
fn test_no_exec_func() {
    let mut router = Router::new("empty", "");
    router.handle_group("sub", "", || {}).unwrap();

    let err = router.run(Context::background(), no_args()).unwrap_err();
    assert!(matches!(err, Error::NoExecFunc { ref command, .. } if command == "empty"));
    assert!(err.usage().unwrap().contains("sub"));
}

#[derive(Debug, Default, Clone, Options)]
pub struct Required {
    #[flag(short = "n", long = "name", desc = "must be given")]
    pub name: String,
    #[flag(short = "q", long = "quiet")]
    pub quiet: bool,
}

#[test]
fn test_missing_required_value() {
    let mut router = Router::new("required", "");
    router.handle(|_: Required| {}).unwrap();

    let err = router.run(Context::background(), no_args()).unwrap_err();
    assert!(
        matches!(err, Error::NoInputValue { ref message, .. } if message.contains("--name")),
        "{err:?}"
    );
    assert!(err.to_string().contains("--name <STRING>"));
    assert!(err.usage().unwrap().contains("--name"));

    router.run(Context::background(), ["-n", "x"]).unwrap();
}

#[derive(Debug, Default, Clone, Options)]
pub struct Clashing {
    #[flag(short = "q", long = "quiet-mode")]
    pub quiet: bool,
}

#[test]
fn test_duplicate_option() {
    let mut router = Router::new("dup", "");
    router.middleware(|_: Required| {}).unwrap();

    let err = router.handle(|_: Clashing| {}).unwrap_err();
    assert!(matches!(err, Error::DuplicateOption { ref flag, .. } if flag == "-q/--quiet-mode"));
    assert_eq!(router.describe().options.len(), 2);

    router
        .handle_group("sub", "", |_: Clashing| {})
        .expect("identifiers are scoped per command");
}

#[test]
fn test_signature_errors() {
    let mut router = Router::new("signatures", "");

    let err = router.handle(|_: Next| {}).unwrap_err();
    assert!(matches!(err, Error::UnsupportedHandlerShape { position: 0, .. }));

    let err = router.handle(|_: Bound<AllTypes>, _: Context| {}).unwrap_err();
    assert!(matches!(err, Error::UnsupportedHandlerShape { .. }));

    let err = router
        .handle(|_: Context, _: AllTypes, _: Context| {})
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHandlerSignature { arity: 3 }));

    let err = router.middleware(|_: CtxNext| {}).unwrap_err();
    assert!(matches!(err, Error::InvalidMiddlewareSignature { .. }));

    let err = router
        .middleware(|_: AllTypes, _: Context, _: Next| {})
        .unwrap_err();
    assert!(matches!(err, Error::InvalidMiddlewareSignature { .. }));

    let err = router
        .middleware(|_: Context, _: AllTypes, _: Next, _: Next| {})
        .unwrap_err();
    assert!(matches!(err, Error::TooManyMiddlewareArgs { arity: 4 }));

    assert!(router.describe().options.is_empty());
}

#[test]
fn test_parsed_reports_supplied_fields() {
    let mut router = Router::new("parsed", "");
    let live: Rc<RefCell<Option<Bound<AllTypes>>>> = Rc::default();
    let seen = Rc::new(Cell::new((false, false)));

    let (l, s) = (live.clone(), seen.clone());
    router
        .handle(move |ctx: Context, opts: Bound<AllTypes>| {
            {
                let current = opts.borrow();
                s.set((
                    flagroute::parsed(&ctx, &current.int),
                    flagroute::parsed(&ctx, &current.uint),
                ));
            }
            *l.borrow_mut() = Some(opts);
        })
        .unwrap();

    router.run(Context::background(), ["-i", "1"]).unwrap();
    assert_eq!(seen.get(), (true, false));

    let opts = live.borrow().clone().unwrap();
    assert!(router.parsed(&opts.borrow().int));
    assert!(!router.parsed(&opts.borrow().text));

    router.run(Context::background(), no_args()).unwrap();
    assert_eq!(seen.get(), (false, false));
    assert!(!router.parsed(&opts.borrow().int));
}
