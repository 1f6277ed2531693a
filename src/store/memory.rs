//! In-memory project store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ProjectMutation, ProjectStore, TaskMutation};
use crate::error::{EngineError, EngineResult};
use crate::model::{Project, ProjectId, Task, TaskId};

#[derive(Default)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    /// Creation order for deterministic listings
    project_order: Vec<ProjectId>,
    tasks: HashMap<TaskId, Task>,
    /// Per-project task ids in creation order
    tasks_by_project: HashMap<ProjectId, Vec<TaskId>>,
}

/// In-memory `ProjectStore` backed by a read-write lock.
///
/// All mutations hold the write lock for their full duration, which makes
/// every update atomic with respect to concurrent readers and writers.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, project: Project) -> EngineResult<()> {
        let mut tables = self.tables.write();
        tables.project_order.push(project.id);
        tables.projects.insert(project.id, project);
        Ok(())
    }

    async fn project(&self, id: ProjectId) -> EngineResult<Project> {
        self.tables.read().projects.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    async fn projects(&self) -> EngineResult<Vec<Project>> {
        let tables = self.tables.read();
        Ok(tables
            .project_order
            .iter()
            .filter_map(|id| tables.projects.get(id).cloned())
            .collect())
    }

    async fn update_project(
        &self,
        id: ProjectId,
        mutation: ProjectMutation,
    ) -> EngineResult<Project> {
        let mut tables = self.tables.write();
        let project = tables.projects.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        mutation(project);
        Ok(project.clone())
    }

    async fn insert_tasks(&self, tasks: Vec<Task>) -> EngineResult<()> {
        let mut tables = self.tables.write();
        for task in tasks {
            tables.tasks_by_project.entry(task.project_id).or_default().push(task.id);
            tables.tasks.insert(task.id, task);
        }
        Ok(())
    }

    async fn task(&self, id: TaskId) -> EngineResult<Task> {
        self.tables.read().tasks.get(&id).cloned().ok_or(EngineError::TaskNotFound)
    }

    async fn project_tasks(&self, project_id: ProjectId) -> EngineResult<Vec<Task>> {
        let tables = self.tables.read();
        Ok(tables
            .tasks_by_project
            .get(&project_id)
            .map(|ids| ids.iter().filter_map(|id| tables.tasks.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn update_task(&self, id: TaskId, mutation: TaskMutation) -> EngineResult<Task> {
        let mut tables = self.tables.write();
        let task = tables.tasks.get_mut(&id).ok_or(EngineError::TaskNotFound)?;
        mutation(task);
        Ok(task.clone())
    }

    async fn delete_project(&self, id: ProjectId) -> EngineResult<()> {
        let mut tables = self.tables.write();
        if tables.projects.remove(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        tables.project_order.retain(|pid| *pid != id);
        if let Some(task_ids) = tables.tasks_by_project.remove(&id) {
            for task_id in task_ids {
                tables.tasks.remove(&task_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectStatus, TaskStatus};
    use std::path::PathBuf;

    fn sample_project() -> Project {
        Project::draft("Build a personal budget tracker web app", PathBuf::from("/tmp/out"))
    }

    #[tokio::test]
    async fn test_insert_and_fetch_project() {
        let store = MemoryStore::new();
        let project = sample_project();
        let id = project.id;

        store.insert_project(project).await.unwrap();
        let fetched = store.project(id).await.unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, ProjectStatus::Draft);
    }

    #[tokio::test]
    async fn test_fetch_unknown_project_fails() {
        let store = MemoryStore::new();
        let result = store.project(ProjectId::new()).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_project_applies_mutation() {
        let store = MemoryStore::new();
        let project = sample_project();
        let id = project.id;
        store.insert_project(project).await.unwrap();

        let updated = store
            .update_project(id, Box::new(|p| p.status = ProjectStatus::Planning))
            .await
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::Planning);
        assert_eq!(store.project(id).await.unwrap().status, ProjectStatus::Planning);
    }

    #[tokio::test]
    async fn test_project_tasks_preserve_creation_order() {
        let store = MemoryStore::new();
        let project = sample_project();
        let pid = project.id;
        store.insert_project(project).await.unwrap();

        let tasks = vec![
            Task::new(pid, "first", "first"),
            Task::new(pid, "second", "second"),
            Task::new(pid, "third", "third"),
        ];
        store.insert_tasks(tasks).await.unwrap();

        let titles: Vec<String> =
            store.project_tasks(pid).await.unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_delete_project_cascades_to_tasks() {
        let store = MemoryStore::new();
        let project = sample_project();
        let pid = project.id;
        store.insert_project(project).await.unwrap();

        let task = Task::new(pid, "only", "only");
        let tid = task.id;
        store.insert_tasks(vec![task]).await.unwrap();

        store.delete_project(pid).await.unwrap();
        assert!(store.project(pid).await.is_err());
        assert!(store.task(tid).await.is_err());
        assert!(store.project_tasks(pid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_task_status() {
        let store = MemoryStore::new();
        let project = sample_project();
        let pid = project.id;
        store.insert_project(project).await.unwrap();

        let task = Task::new(pid, "t", "t");
        let tid = task.id;
        store.insert_tasks(vec![task]).await.unwrap();

        let updated = store
            .update_task(tid, Box::new(|t| t.status = TaskStatus::Running))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_projects_listing_order() {
        let store = MemoryStore::new();
        let first = sample_project();
        let second = sample_project();
        let (id1, id2) = (first.id, second.id);

        store.insert_project(first).await.unwrap();
        store.insert_project(second).await.unwrap();

        let ids: Vec<ProjectId> =
            store.projects().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![id1, id2]);
    }
}
