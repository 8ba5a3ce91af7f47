//! Integration tests for the background event loop.

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use uidrive::{
        LoopMode, Session,
        display::Display,
        error::{BoxError, Result},
        headless::HeadlessDisplay,
        logging, poll,
    };

    #[test]
    fn wait_for_idle_sees_pending_timer() -> Result<()> {
        logging::init_test_logging();
        let s = Session::init(HeadlessDisplay::new)?;
        let run = s.run_background(false)?.unwrap();

        s.dispatch(|d| d.timer_exec(Duration::from_millis(300), Box::new(|| {})))?;
        assert!(!s.wait_for_idle(Duration::from_millis(250), Duration::from_millis(200))?);
        assert!(s.wait_for_idle(Duration::from_millis(500), Duration::from_millis(200))?);

        s.request_stop();
        run.join()?;
        Ok(())
    }

    #[test]
    fn idle_watch_run_exits_without_leaving_timers() -> Result<()> {
        let s = Session::builder(HeadlessDisplay::new)
            .idle_threshold(Duration::from_millis(40))
            .wake_margin(Duration::from_millis(10))
            .build()?;
        let start = Instant::now();
        let run = s.run_background(true)?.unwrap();
        assert_eq!(run.mode(), LoopMode::ActiveIdleWatch);
        run.join()?;
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(s.state().mode(), LoopMode::Idle);
        assert!(!s.state().is_loop_enabled());
        assert_eq!(s.dispatch(|d| d.pending_timers())?, 0);
        Ok(())
    }

    #[test]
    fn timers_left_after_a_run_do_not_block_idle() -> Result<()> {
        let s = Session::builder(HeadlessDisplay::new)
            .idle_threshold(Duration::from_millis(40))
            .wake_margin(Duration::from_millis(10))
            .build()?;

        // Scheduled through the running loop.
        let run = s.run_background(true)?.unwrap();
        s.dispatch(|d| d.timer_exec(Duration::from_secs(60), Box::new(|| {})))?;
        run.join()?;
        assert_eq!(s.state().mode(), LoopMode::Idle);
        assert_eq!(s.dispatch(|d| d.pending_timers())?, 1);
        assert!(s.wait_for_idle(Duration::from_millis(500), Duration::from_millis(50))?);

        // Scheduled while no run pumps.
        s.dispatch(|d| d.timer_exec(Duration::from_secs(60), Box::new(|| {})))?;
        assert_eq!(s.dispatch(|d| d.pending_timers())?, 2);
        assert!(s.wait_for_idle(Duration::from_millis(500), Duration::from_millis(50))?);
        Ok(())
    }

    #[test]
    fn stop_request_survives_begin_test() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        for i in 0..10 {
            let run = s.run_background(false)?.unwrap();
            thread::sleep(Duration::from_millis(5));
            s.request_stop();
            let test = s.begin_test(format!("next-{i}"));
            assert!(poll::wait_until(Duration::from_secs(2), || {
                !s.state().is_pumping()
            }));
            run.join()?;
            assert!(test.finish().is_empty());
        }
        Ok(())
    }

    #[test]
    fn activity_keeps_idle_watch_run_alive() -> Result<()> {
        let s = Session::builder(HeadlessDisplay::new)
            .idle_threshold(Duration::from_millis(150))
            .wake_margin(Duration::from_millis(20))
            .build()?;
        let handle = s.dispatch(|d| d.handle())?;
        let run = s.run_background(true)?.unwrap();

        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(400) {
            handle.post_handler(|| Ok(()));
            thread::sleep(Duration::from_millis(20));
        }
        assert!(s.state().is_pumping());
        run.join()?;
        assert!(!s.state().is_pumping());
        Ok(())
    }

    #[test]
    fn request_stop_ends_unbounded_run() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        let run = s.run_background(false)?.unwrap();
        assert!(s.state().is_loop_enabled());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(s.state().mode(), LoopMode::ActiveUnbounded);

        s.request_stop();
        assert!(!s.state().is_loop_enabled());
        run.join()?;
        assert_eq!(s.state().mode(), LoopMode::Idle);

        // A new run can start afterwards.
        let again = s.run_background(false)?.unwrap();
        s.request_stop();
        again.join()?;
        Ok(())
    }

    #[test]
    fn handler_failures_do_not_stop_the_loop() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        let test = s.begin_test("handler_failures_do_not_stop_the_loop");
        let handle = s.dispatch(|d| d.handle())?;
        let run = s.run_background(false)?.unwrap();

        handle.post_handler(|| Err::<(), BoxError>("handler refused".into()));
        handle.post_handler(|| panic!("handler blew up"));
        assert_eq!(s.dispatch(|_| 7)?, 7);
        assert!(s.state().is_pumping());

        let errors = test.finish();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message().contains("handler refused"));
        assert!(errors[1].message().contains("handler blew up"));
        assert!(s.drain_errors().is_empty());

        s.request_stop();
        run.join()?;
        Ok(())
    }

    #[test]
    fn errors_are_cleared_when_a_run_starts() -> Result<()> {
        let s = Session::builder(HeadlessDisplay::new)
            .idle_threshold(Duration::from_millis(30))
            .build()?;
        let handle = s.dispatch(|d| d.handle())?;
        handle.post_handler(|| Err::<(), BoxError>("first".into()));
        s.flush()?;
        let errors = s.drain_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "first");

        handle.post_handler(|| Err::<(), BoxError>("second".into()));
        s.flush()?;
        handle.post_handler(|| Err::<(), BoxError>("third".into()));
        s.flush()?;
        let errors = s.drain_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "third");
        Ok(())
    }

    #[test]
    fn wake_counts_as_activity() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        let run = s.run_background(false)?.unwrap();
        assert!(s.wait_for_idle(Duration::from_secs(2), Duration::from_millis(50))?);

        s.controller().wake();
        assert!(poll::wait_until(Duration::from_secs(1), || {
            s.state().idle_for() < Duration::from_millis(50)
        }));
        assert!(s.wait_for_idle(Duration::from_secs(2), Duration::from_millis(50))?);

        s.request_stop();
        run.join()?;
        Ok(())
    }

    #[test]
    fn teardown_is_idempotent() -> Result<()> {
        let s = Session::init(HeadlessDisplay::new)?;
        s.run_background(false)?;
        s.teardown();
        assert!(!s.state().is_pumping());
        s.teardown();
        assert!(s.dispatch(|_| ()).is_err());
        Ok(())
    }
}
