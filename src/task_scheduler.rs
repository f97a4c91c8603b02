use std::{
    thread,
    sync::{Arc, Mutex, PoisonError},
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};
use threadpool::ThreadPool;


/// Returns the delay until the next run, or `None` to retire the task.
pub type FnTask = dyn Fn() -> Option<Duration> + Send + Sync + 'static;


pub struct Task {
    name: String,
    job: Arc<FnTask>,
    next_time: Instant,
    running: bool,
    retired: bool,
}

impl Task {
    pub fn new<F>(name: &str, job: F, first_delay: Duration) -> Self where
        F: Fn() -> Option<Duration> + Send + Sync + 'static {

        Task {
            name: name.to_owned(),
            job: Arc::new(job),
            next_time: Instant::now() + first_delay,
            running: false,
            retired: false,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        !self.running && !self.retired && now >= self.next_time
    }

    fn finish_job(&mut self, next: Option<Duration>) {
        self.running = false;

        match next {
            Some(delay) => self.next_time = Instant::now() + delay,
            None => {
                info!("Task '{}' retired", self.name);
                self.retired = true;
            },
        }
    }
}


const N_WORKERS: usize = 2;


pub struct TaskSchedulerBuilder {
    tasks: Vec<Arc<Mutex<Task>>>,
    period_resolution: Duration,
}

impl TaskSchedulerBuilder {
    pub fn new() -> Self {
        TaskSchedulerBuilder {
            tasks: Vec::new(),
            period_resolution: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    pub fn period_resolution(mut self, period: Duration) -> Self {
        self.period_resolution = period;
        self
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(Arc::new(Mutex::new(task)));
    }

    #[cfg(test)]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn build(self) -> TaskScheduler {
        TaskScheduler::new(self)
    }
}


fn lock(task: &Mutex<Task>) -> std::sync::MutexGuard<Task> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}


pub struct TaskScheduler {
    scheduler: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl TaskScheduler {
    fn new(builder: TaskSchedulerBuilder) -> Self {
        let tasks = builder.tasks;
        let period_resolution = builder.period_resolution;

        let running = Arc::new(AtomicBool::new(true));
        let t_running = running.clone();

        let scheduler_job = move || {
            let pool = ThreadPool::with_name("task-worker".into(), N_WORKERS);

            while t_running.load(Ordering::SeqCst) {
                let now = Instant::now();

                for m_task in &tasks {
                    let mut task = lock(m_task);
                    if !task.ready(now) {
                        continue;
                    }
                    task.running = true;

                    let job = task.job.clone();
                    let t_task = m_task.clone();
                    pool.execute(move || {
                        let next = (*job)();
                        lock(&t_task).finish_job(next);
                    });
                }

                thread::sleep(period_resolution);
            }

            pool.join();
        };

        let scheduler = thread::Builder::new()
            .name("task-scheduler".into())
            .spawn(scheduler_job);

        let scheduler = match scheduler {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("Fail to start task scheduler: {}", err);
                None
            },
        };

        TaskScheduler {
            scheduler,
            running,
        }
    }

    /// Stops scheduling and waits for running jobs.
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(scheduler) = self.scheduler.take() {
            if scheduler.join().is_err() {
                error!("Task scheduler panicked");
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
